use docopt::Docopt;
use serde::Deserialize;
use std::io::Write;

use gl_trace::codec::Serialize;
use gl_trace::{receive_frame, MessageStream, Options, RemoteCommand};

const USAGE: &'static str = "
Capture one frame from a process running with gl-trace.

Connect to the instrumented process at <address>, ask it to capture its
next frame, and save what it sends as a trace file.

Usage:
  capture-host [options] <address>
  capture-host (-h | --help)

Options:
  -h, --help    Show this message.
  --port=N      The port the process is listening on [default: 34199].
  --out=FILE    Where to write the trace [default: frame.gltrace].
  --terminate   Ask the process to stop capturing once the frame arrives.
";

#[derive(Debug, Deserialize)]
struct Args {
    arg_address: String,
    flag_port: u16,
    flag_out: String,
    flag_terminate: bool,
}

impl Args {
    fn options(&self) -> Options {
        Options {
            server_port: self.flag_port,
            trace_file: self.flag_out.clone(),
            ..Options::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());
    let options = args.options();

    let mut stream = MessageStream::connect((args.arg_address.as_str(), options.server_port))?;
    log::info!("connected to {}:{}", args.arg_address, options.server_port);

    RemoteCommand::Capture.serialize(&mut stream)?;
    stream.flush()?;
    let trace = receive_frame(&mut stream)?;

    if args.flag_terminate {
        RemoteCommand::Terminate.serialize(&mut stream)?;
        stream.flush()?;
    }

    trace.save_file(&options.trace_file)?;
    println!("wrote {} packets to {}", trace.packets.len(), options.trace_file);

    Ok(())
}
