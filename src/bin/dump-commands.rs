use docopt::Docopt;
use serde::Deserialize;

use gl_trace::Trace;

const USAGE: &'static str = "
Print the commands in a gl-trace capture.

Usage:
  dump-commands [--state] <trace>...

Options:
  --state   Also print the context state captured before the frame.
";

#[derive(Debug, Deserialize)]
struct Args {
    arg_trace: Vec<String>,
    flag_state: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    for path in &args.arg_trace {
        let trace = match Trace::load_file(path) {
            Ok(trace) => trace,
            Err(err) => {
                eprintln!("{}: {}", path, err);
                continue;
            }
        };

        println!("{}: {} packets", path, trace.packets.len());
        if args.flag_state {
            println!("{:#?}", trace.state);
        }
        for packet in &trace.packets {
            println!("{:4} {:?}", packet.id, packet.command);
        }
    }

    Ok(())
}
