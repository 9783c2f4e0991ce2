use anyhow::{Context as _, Result};
use sigmux_lib::{Entropy, Sign as _};
use sigmux_network::{net::Dialer, send, Envelope};
use sigmuxd::{secret::Secret, Config};
use std::path::PathBuf;
use structopt::StructOpt;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(StructOpt, Debug)]
struct Args {
    /// set log levels
    ///
    /// useful for trying to debug some operations happening
    /// while executing some of the commands
    #[structopt(long = "log-level", default_value = "warn", global = true)]
    log_level: Level,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// print the default configuration to the standard output
    DefaultConfig,

    /// generate a new keypair
    GenerateNewKey {
        /// path of the file to store the entropy in
        ///
        /// if no value is given, this value will be asked during the
        /// generation time
        #[structopt(long = "entropy-output")]
        entropy: Option<PathBuf>,

        /// set the password instead of having the problem prompted for it
        ///
        #[structopt(long = "password", env = "SIGMUXD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// sign a message with the node's key and send it to a peer
    Send {
        /// set the password instead of having the problem prompted for it
        ///
        #[structopt(long = "password", env = "SIGMUXD_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// path of the configuration file of the server
        #[structopt(long = "config")]
        config: PathBuf,

        /// address of the peer to send the message to
        #[structopt(long = "to")]
        to: String,

        /// the message to send
        message: String,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::from_args();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {}", error);
        std::process::exit(1);
    }

    let result = match args.cmd {
        Command::DefaultConfig => default_config()
            .await
            .context("Cannot generate default configuration"),
        Command::GenerateNewKey { entropy, password } => generate_new_key(entropy, password)
            .await
            .context("Cannot generate new key"),
        Command::Send {
            password,
            config,
            to,
            message,
        } => send_message(password, config, to, message)
            .await
            .context("Cannot send message"),
    };

    if let Err(error) = result {
        eprintln!("{:#?}", error);
        std::process::exit(1);
    }
}

async fn default_config() -> Result<()> {
    println!("{}", Config::EXAMPLE);
    Ok(())
}

async fn send_message(
    password: Option<String>,
    config: PathBuf,
    to: String,
    message: String,
) -> Result<()> {
    let mut config = Config::from_file(config)?;

    let password = if let Some(password) = password {
        tracing::info!("using password from environment or command line parameter");
        password
    } else {
        dialoguer::Password::new()
            .allow_empty_password(false)
            .with_prompt("Enter password")
            .interact()
            .context("Failed gather password")?
    };
    config.secret.password = Some(password);

    let secret = Secret::new(config.secret).context("Cannot retrieve the secret to sign with")?;

    let envelope = Envelope::sign(
        message,
        &secret,
        config.network.public_address.to_string(),
    );

    send(&Dialer::new(to.as_str()), &envelope)
        .await
        .with_context(|| format!("Cannot send the message to {}", to))?;

    println!("message sent to {}", to);

    Ok(())
}

async fn generate_new_key(entropy_output: Option<PathBuf>, password: Option<String>) -> Result<()> {
    println!("Generating new entropy to use as part of the seed for the new key");
    let entropy = Entropy::generate(rand::thread_rng());

    let entropy_output = if let Some(entropy_output) = entropy_output {
        entropy_output
    } else {
        let s: String = dialoguer::Input::new()
            .with_prompt("Output file to store the entropy")
            .allow_empty(false)
            .with_initial_text("entropy.txt")
            .interact_text()
            .context("Failed to confirm entropy output file")?;
        PathBuf::from(s)
    };
    tracing::info!(file = ?entropy_output, "writing entropy in file");
    std::fs::write(&entropy_output, entropy.to_string())
        .with_context(|| format!("Cannot write entropy to file: {}", entropy_output.display()))?;

    let password = if let Some(password) = password {
        tracing::info!("using password from environment or command line parameter");
        password
    } else {
        dialoguer::Password::new()
            .with_confirmation(
                "Confirm new password",
                "Password mismatched, put your game together",
            )
            .allow_empty_password(false)
            .with_prompt("Enter new password")
            .interact()
            .context("Failed to confirm new password")?
    };

    println!("Generating new key... this may take some times...");

    let instant = std::time::Instant::now();
    let secret = Secret::derive(&entropy, password);
    let elapsed = instant.elapsed().as_millis();
    tracing::info!(elapsed = %elapsed, "new key derived");

    println!("New private key generated successfully");
    println!("Public Identity: {}", secret.public_key());

    Ok(())
}
