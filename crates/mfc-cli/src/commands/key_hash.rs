use anyhow::Context as _;
use mfc_common::Buffer;
use mfc_keys::{key_hash, KeyType, SectorKey};

pub fn cmd_key_hash(key_hex: &str, salt: &str) -> anyhow::Result<()> {
    let key = Buffer::from_hex(key_hex).context("key is not valid hex")?;
    // Reject anything that could not be a sector key
    SectorKey::new(key.clone(), KeyType::Unknown, "").context("invalid key")?;
    println!("{}", key_hash(&key, salt));
    Ok(())
}
