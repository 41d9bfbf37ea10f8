use crate::demo::{run_demo, run_phone_check, DemoArgs, PhoneArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use laburar::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "LaburAr",
    about = "Run the LaburAr local-services directory or try it from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Validate an Argentine WhatsApp number and print its contact links
    Phone(PhoneArgs),
    /// Walk through publishing, searching, and contacting listings in memory
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Phone(args) => {
            run_phone_check(args);
            Ok(())
        }
        Command::Demo(args) => run_demo(args).await,
    }
}
