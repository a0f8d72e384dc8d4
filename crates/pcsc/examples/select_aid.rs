//! Example waiting for a card and selecting an application by AID

use smartcard_pcsc::prelude::*;

const AID: &str = "90725A9E3B1070AA";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let aid = match std::env::args().nth(1) {
        Some(aid) => hex::decode(aid)?,
        None => hex::decode(AID)?,
    };

    let context = Context::establish(Scope::User)?;
    println!("Waiting for a card...");
    let reader = context.wait_for_card_present()?;
    println!("Card found in {}", reader.name());

    let mut card = reader.connect()?;
    println!("Connected using {}, ATR: {}", card.protocol(), card.atr());

    let response = card.transmit_apdu(&Command::select(aid))?;
    println!("{response}");
    if !response.is_success() {
        println!("Select failed: {}", response.status().description());
    }

    card.disconnect()?;
    context.release()?;
    Ok(())
}
