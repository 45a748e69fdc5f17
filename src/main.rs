use std::env;
use std::path::Path;
use std::process;

use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tutor_credit::csv::{read_lessons, read_lots, write_allocations};
use tutor_credit::{Config, Ledger, LedgerEvent, Tier};

const USAGE: &str = "usage: tutor-credit <lots.csv> <lessons.csv> [basic|premium|elite|none]";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let (Some(lots_path), Some(lessons_path)) = (args.next(), args.next()) else {
        eprintln!("{USAGE}");
        process::exit(2);
    };
    let tier = match args.next().as_deref() {
        None | Some("none") => None,
        Some(raw) => match raw.parse::<Tier>() {
            Ok(tier) => Some(tier),
            Err(e) => {
                eprintln!("{e}\n{USAGE}");
                process::exit(2);
            }
        },
    };

    let config = match env::var("TUTOR_CREDIT_CONFIG") {
        Ok(path) => Config::from_path(&path).unwrap_or_else(|e| {
            error!("{e}");
            process::exit(1);
        }),
        Err(_) => Config::default(),
    };

    let (lots, lessons) = match (
        read_lots(Path::new(&lots_path)),
        read_lessons(Path::new(&lessons_path)),
    ) {
        (Ok(lots), Ok(lessons)) => (lots, lessons),
        (Err(e), _) | (_, Err(e)) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let mut ledger = Ledger::new(tier, config);
    let (event_sender, event_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        let lots = lots.map(|r| r.map(LedgerEvent::Lot));
        let lessons = lessons.map(|r| r.map(LedgerEvent::Lesson));
        for result in lots.chain(lessons) {
            match result {
                Ok(event) => {
                    if event_sender.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    ledger.run(ReceiverStream::new(event_receiver)).await;

    if let Err(e) = write_allocations(std::io::stdout().lock(), ledger.allocations()) {
        error!("failed to write allocations: {e}");
        process::exit(1);
    }
}
