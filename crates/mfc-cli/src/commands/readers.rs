use anyhow::Context as _;
use mfc_card::CardReader;

pub fn cmd_readers() -> anyhow::Result<()> {
    let reader = CardReader::new().context("failed to establish PC/SC context")?;
    let readers = reader.list_readers().context("failed to list readers")?;

    if readers.is_empty() {
        println!("No readers found");
        return Ok(());
    }
    for (i, name) in readers.iter().enumerate() {
        println!("{}: {}", i + 1, name);
    }
    Ok(())
}
