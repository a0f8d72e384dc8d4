//! Example dumping the daemon's reader-state table

use smartcard_pcsc::{Context, Scope};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let context = Context::establish(Scope::User)?;
    let readers = context.list_readers()?;
    println!("Found {} readers:", readers.len());

    for reader in &readers {
        print!("{reader}");
        match reader.atr() {
            Some(atr) => println!("   Card present, ATR: {atr}"),
            None => println!("   No card present"),
        }
    }

    context.release()?;
    Ok(())
}
