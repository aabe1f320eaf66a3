// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Wait for edge events on one or more lines of a chip, like libgpiod's
//! `gpiomon`.

use gpio_lines::{Chip, Error, EventKind, LineEvent, RequestConfig};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use quicli::prelude::*;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip device (e.g. /dev/gpiochip0, gpiochip0, 0 or a label)
    chip: String,
    /// The offsets of the GPIO lines to monitor
    #[structopt(required = true)]
    lines: Vec<u32>,
    /// Set the line active state to low
    #[structopt(short = "l", long = "active-low")]
    active_low: bool,
    /// Exit after processing this many events
    #[structopt(short = "n", long = "num-events")]
    num_events: Option<usize>,
    /// Only process rising edge events
    #[structopt(short = "r", long = "rising-edge")]
    rising_edge: bool,
    /// Only process falling edge events
    #[structopt(short = "f", long = "falling-edge")]
    falling_edge: bool,
    /// Don't print event info
    #[structopt(short = "s", long = "silent")]
    silent: bool,
    /// Custom output format: %o offset, %e event (1 rising, 0 falling),
    /// %s seconds, %n nanoseconds, %% a literal percent sign
    #[structopt(short = "F", long = "format")]
    format: Option<String>,
}

fn format_event(fmt: &str, event: &LineEvent) -> String {
    let ts = event.timestamp();
    let mut out = String::new();
    let mut chars = fmt.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('o') => out.push_str(&event.line().offset().to_string()),
            Some('e') => out.push(match event.kind() {
                EventKind::Rising => '1',
                EventKind::Falling => '0',
            }),
            Some('s') => out.push_str(&ts.as_secs().to_string()),
            Some('n') => out.push_str(&ts.subsec_nanos().to_string()),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }

    out
}

fn default_format(event: &LineEvent) -> String {
    let ts = event.timestamp();
    let kind = match event.kind() {
        EventKind::Rising => " RISING EDGE",
        EventKind::Falling => "FALLING EDGE",
    };

    format!(
        "event: {} offset: {} timestamp: [{:8}.{:09}]",
        kind,
        event.line().offset(),
        ts.as_secs(),
        ts.subsec_nanos()
    )
}

extern "C" fn on_stop_signal(_: libc::c_int) {}

/// Let SIGINT and SIGTERM interrupt the event wait instead of killing the
/// process, so the lines are released on the way out.
fn stop_on_signals() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_stop_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        unsafe { sigaction(signal, &action) }?;
    }
    Ok(())
}

/// `None` when a stop signal ended the call.
fn unless_stopped<T>(result: gpio_lines::Result<T>) -> gpio_lines::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(Error::Interrupted) => Ok(None),
        Err(e) => Err(e),
    }
}

fn do_main(args: Cli) -> anyhow::Result<()> {
    let chip = Chip::open_lookup(&args.chip)?;

    let config = RequestConfig::new("gpiomon");
    let config = match (args.rising_edge, args.falling_edge) {
        (true, false) => config.rising_edge(),
        (false, true) => config.falling_edge(),
        _ => config.both_edges(),
    };
    let config = if args.active_low {
        config.active_low()
    } else {
        config
    };

    let lines = chip.get_lines(&args.lines)?;
    lines.request(&config, None)?;
    stop_on_signals()?;

    let mut seen = 0;
    loop {
        let Some(ready) = unless_stopped(lines.event_wait(None))? else {
            return Ok(());
        };

        for line in &ready {
            let Some(events) = unless_stopped(line.event_read_multiple())? else {
                return Ok(());
            };
            for event in events {
                if !args.silent {
                    match &args.format {
                        Some(fmt) => println!("{}", format_event(fmt, &event)),
                        None => println!("{}", default_format(&event)),
                    }
                }

                seen += 1;
                if args.num_events.map_or(false, |n| seen >= n) {
                    return Ok(());
                }
            }
        }
    }
}

fn main() -> CliResult {
    let args = Cli::from_args();
    do_main(args).or_else(|e| {
        error!("{:?}", e);
        std::process::exit(1)
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interrupted_is_a_clean_stop() {
        assert!(matches!(unless_stopped(Ok(3)), Ok(Some(3))));
        assert!(matches!(unless_stopped::<()>(Err(Error::Interrupted)), Ok(None)));
        assert!(matches!(
            unless_stopped::<()>(Err(Error::EmptySet)),
            Err(Error::EmptySet)
        ));
    }
}
