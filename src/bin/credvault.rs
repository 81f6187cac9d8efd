//! credvault CLI - local credential vault
//!
//! Thin command-line front-end over the vault session: every command logs
//! in (or registers), performs one operation and closes the session.

use std::error::Error as StdError;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use credvault::cipher::VaultKey;
use credvault::generator::generate_password;
use credvault::prompt::{SecretReader, StreamSecretReader, TerminalSecretReader};
use credvault::{DecryptedCredential, Result, Session, Vault, VaultConfig, VaultError};

#[derive(Parser)]
#[command(name = "credvault")]
#[command(version)]
#[command(about = "Local credential vault.", long_about = None)]
struct Cli {
    /// Directory holding the ledger and the per-user credential files
    #[arg(long, global = true, env = "CREDVAULT_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Key material used to protect secrets (defaults to the legacy key)
    #[arg(long, global = true, env = "CREDVAULT_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Keep the ledger gzip-compressed between sessions
    #[arg(long, global = true)]
    compress_ledger: bool,

    /// Read passwords and secrets from stdin, one per line, instead of from
    /// the terminal
    #[arg(long, global = true)]
    password_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new account
    Register {
        /// Name of the vault user
        username: String,
    },

    /// Store a secret for a service
    #[command(alias = "a")]
    Add {
        /// Name of the vault user
        username: String,
        /// Service the secret belongs to, e.g. email or bank
        service: String,
        /// Username for the service
        service_username: String,
    },

    /// Show all stored secrets
    #[command(alias = "ls")]
    List {
        /// Name of the vault user
        username: String,
    },

    /// Show the secret stored for one service
    Get {
        /// Name of the vault user
        username: String,
        /// Service to look up
        service: String,
    },

    /// Delete every secret stored for a service
    #[command(alias = "rm")]
    Delete {
        /// Name of the vault user
        username: String,
        /// Service to delete
        service: String,
    },

    /// Generate a random password, optionally storing it
    Generate {
        /// Number of characters
        #[arg(short, long, default_value_t = 16)]
        length: usize,

        /// Store the generated password for a service
        #[arg(long, num_args = 3, value_names = ["USERNAME", "SERVICE", "SERVICE_USERNAME"])]
        save: Option<Vec<String>>,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        let mut source = StdError::source(&e);
        while let Some(inner) = source {
            eprintln!("  caused by: {}", inner);
            source = inner.source();
        }
        process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("credvault=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = VaultConfig {
        data_dir: cli.data_dir,
        key: cli
            .key
            .as_deref()
            .map(VaultKey::from_material)
            .unwrap_or_default(),
        compress_ledger: cli.compress_ledger,
        ..VaultConfig::default()
    };
    let vault = Vault::open(config);
    let mut reader = get_secret_reader(cli.password_stdin);

    let result = run_command(&vault, cli.command, &mut *reader);
    vault.close();
    result
}

fn run_command(vault: &Vault, command: Commands, reader: &mut dyn SecretReader) -> Result<()> {
    match command {
        Commands::Register { username } => {
            if vault.ledger().contains_user(&username)? {
                eprintln!(
                    "Warning: '{}' is already registered; the existing credentials will be reset",
                    username
                );
            }
            let password = reader.read_secret("Master password")?;
            let session = vault.register(&username, &password)?;
            println!("Account '{}' created.", session.username());
            session.close();
            Ok(())
        }
        Commands::Add {
            username,
            service,
            service_username,
        } => in_session(login(vault, &username, reader)?, |session| {
            let secret = reader.read_secret(&format!("Password for {}", service))?;
            session.add(&service, &service_username, &secret)?;
            println!("Password successfully added for service: {}", service);
            Ok(())
        }),
        Commands::List { username } => in_session(login(vault, &username, reader)?, |session| {
            let credentials = session.list_decrypted().collect::<Result<Vec<_>>>()?;
            if credentials.is_empty() {
                println!("No passwords stored.");
            } else {
                print_table(&credentials);
            }
            Ok(())
        }),
        Commands::Get { username, service } => {
            in_session(login(vault, &username, reader)?, |session| {
                let credential = session.reveal(&service)?;
                print_table(std::slice::from_ref(&credential));
                Ok(())
            })
        }
        Commands::Delete { username, service } => {
            in_session(login(vault, &username, reader)?, |session| {
                session.delete(&service)?;
                println!("Deleted all passwords for service: {}", service);
                Ok(())
            })
        }
        Commands::Generate { length, save } => {
            let password = zeroize::Zeroizing::new(generate_password(length)?);
            println!("{}", password.as_str());
            match save.as_deref() {
                Some([username, service, service_username]) => {
                    in_session(login(vault, username, reader)?, |session| {
                        session.add(service, service_username, &password)?;
                        println!("Password successfully added for service: {}", service);
                        Ok(())
                    })
                }
                _ => Ok(()),
            }
        }
    }
}

/// Run `op` against `session` and close the session whatever the outcome.
fn in_session<F>(mut session: Session, op: F) -> Result<()>
where
    F: FnOnce(&mut Session) -> Result<()>,
{
    let result = op(&mut session);
    session.close();
    result
}

fn login(vault: &Vault, username: &str, reader: &mut dyn SecretReader) -> Result<Session> {
    let password = reader.read_secret("Master password")?;
    vault
        .login(username, &password)
        .map_err(|e: VaultError| e.with_context(format!("login failed for '{}'", username)))
}

fn print_table(credentials: &[DecryptedCredential]) {
    println!("{:<20}{:<20}Password", "Service", "Username");
    println!("-----------------------------------------------");
    for credential in credentials {
        println!(
            "{:<20}{:<20}{}",
            credential.service,
            credential.username,
            credential.secret.as_str()
        );
    }
}

fn get_secret_reader(use_stdin: bool) -> Box<dyn SecretReader> {
    if use_stdin {
        Box::new(StreamSecretReader::new(Box::new(BufReader::new(io::stdin()))))
    } else {
        Box::new(TerminalSecretReader::new())
    }
}
