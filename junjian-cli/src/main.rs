//! Main entry point for the Junjian command-line client.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::ClientConfig;
use std::path::PathBuf;
use url::Url;

mod commands;
mod telemetry;

use commands::{
    account::{SendCodeArgs, ValidateInviteArgs, VerifyCodeArgs},
    session::{LoginArgs, RegisterArgs},
};

/// Junjian CLI
#[derive(Parser)]
#[command(name = "junjian")]
#[command(about = "Command-line client for the Junjian design-services marketplace", long_about = None)]
struct Cli {
    /// Path to the configuration file (yaml, json or toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// API base URL, overriding configuration and environment
    #[arg(long, global = true)]
    server: Option<Url>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session locally
    Login(LoginArgs),

    /// Create an account and log into it
    Register(RegisterArgs),

    /// Forget the stored session
    Logout,

    /// Show the stored session without contacting the server
    Status,

    /// Fetch the profile of the logged-in user
    Whoami,

    /// Email a verification code
    SendCode(SendCodeArgs),

    /// Check whether an invite code can be used
    ValidateInvite(ValidateInviteArgs),

    /// Check an emailed verification code
    VerifyCode(VerifyCodeArgs),

    /// Check that the API is reachable
    Health,

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(
            long,
            short,
            help = "The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)"
        )]
        shell: clap_complete::Shell,
    },

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate (yaml, json or toml). Defaults to yaml.
        #[arg(
            long,
            short,
            default_value = "yaml",
            help = "Format of the configuration file to generate (yaml, json or toml). Defaults to yaml."
        )]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Completion { shell } => {
            commands::completion::generate_completion(*shell);
            return Ok(());
        }
        Commands::Config { format } => {
            commands::config::generate_config(format)?;
            return Ok(());
        }
        _ => {}
    }

    let config = ClientConfig::load_config(cli.config, cli.server)?;
    telemetry::init(&config.log_level);
    let context = commands::Context::connect(&config)?;

    match cli.command {
        Commands::Login(args) => commands::session::login(&context, args).await,
        Commands::Register(args) => commands::session::register(&context, args).await,
        Commands::Logout => {
            commands::session::logout(&context);
            Ok(())
        }
        Commands::Status => {
            commands::session::status(&context);
            Ok(())
        }
        Commands::Whoami => commands::session::whoami(&context).await,
        Commands::SendCode(args) => commands::account::send_code(&context, args).await,
        Commands::ValidateInvite(args) => commands::account::validate_invite(&context, args).await,
        Commands::VerifyCode(args) => commands::account::verify_code(&context, args).await,
        Commands::Health => commands::account::health(&context).await,
        Commands::Completion { .. } | Commands::Config { .. } => Ok(()),
    }
}
