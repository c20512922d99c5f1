//! Fetches every INBOX summary for one account and prints it.
//!
//! ```sh
//! RUST_LOG=mailbrief_imap=debug \
//!     cargo run --example fetch_inbox -- imap.example.com user password
//! ```

use mailbrief_imap::{AccountId, Config, Connection, Envelope, MailHandler};
use tracing_subscriber::EnvFilter;

struct PrintHandler;

impl MailHandler for PrintHandler {
    fn on_summary(&mut self, _account: AccountId, envelope: Envelope) {
        let from = envelope
            .from
            .first()
            .map_or_else(String::new, |a| a.email.clone());
        println!("#{:>4}  {:<32}  {}", envelope.id, from, envelope.subject);
    }
}

#[tokio::main]
async fn main() -> mailbrief_imap::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(host), Some(user), Some(password)) = (args.next(), args.next(), args.next()) else {
        eprintln!("usage: fetch_inbox <host> <username> <password>");
        std::process::exit(2);
    };

    let config = Config::new(host).credentials(user, password);
    let (connection, handle) = Connection::open(&config, AccountId(1), PrintHandler).await?;

    // No body fetches here; dropping the handle lets the connection finish
    // once the summary fetch drains.
    drop(handle);
    connection.run().await?;
    Ok(())
}
