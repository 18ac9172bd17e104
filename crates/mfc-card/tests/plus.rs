//! MIFARE Plus SL3 secure channel against an in-memory card

mod common;

use common::{block_pattern, VirtualPlus};
use mfc_card::sector::UNAUTHORIZED_SENTINEL;
use mfc_card::{
    ClassicCardTech, ClassicReader, DecoderRegistry, NonceSource, NullFeedback, PlusProtocol,
    ScanConfig, SubType,
};
use mfc_keys::{KeyType, NoKeys, SectorKey};

const AES_FF: [u8; 16] = [0xFF; 16];

fn aes_key(key: [u8; 16]) -> SectorKey {
    SectorKey::new(key.into(), KeyType::A, "test").unwrap()
}

#[test]
fn test_probe_detects_capacity() {
    let plus = PlusProtocol::connect(VirtualPlus::new(32, AES_FF)).unwrap();
    assert_eq!(plus.sector_count(), 32);
    assert_eq!(plus.sub_type(), SubType::Plus);

    let plus = PlusProtocol::connect(VirtualPlus::new(40, AES_FF)).unwrap();
    assert_eq!(plus.sector_count(), 40);
    assert_eq!(plus.block_count_in_sector(39), 16);
    assert_eq!(plus.sector_to_block(32), 128);
}

#[test]
fn test_probe_rejects_silent_card() {
    assert!(PlusProtocol::connect(VirtualPlus::new(0, AES_FF)).is_none());
}

#[test]
fn test_authenticate_and_read_with_counter() {
    let mut plus = PlusProtocol::connect(VirtualPlus::new(32, AES_FF)).unwrap();

    assert!(plus.authenticate(1, &aes_key(AES_FF)).unwrap());
    let session = plus.session().unwrap().clone();
    assert_eq!(session.ti, [0xCA, 0xFE, 0x01, 0x02]);
    assert_eq!(session.rctr, 0);

    for block in 4..8 {
        assert_eq!(plus.read_block(block).unwrap().as_slice(), &block_pattern(block));
    }
    assert_eq!(plus.session().unwrap().rctr, 4);

    let card = plus.into_inner();
    assert_eq!(card.mac_failures, 0);
    let expected: [u8; 16] = core::array::from_fn(|i| (i * i) as u8);
    assert_eq!(card.last_rnd_a, Some(expected));
    let read = card.frames.last().unwrap();
    assert_eq!(&read[..4], &[0x33, 7, 0, 1]);
    assert_eq!(read.len(), 12);
}

#[test]
fn test_session_is_deterministic_and_counter_advances() {
    let mut first = PlusProtocol::connect(VirtualPlus::new(32, AES_FF)).unwrap();
    let mut second = PlusProtocol::connect(VirtualPlus::new(32, AES_FF)).unwrap();
    assert!(first.authenticate(0, &aes_key(AES_FF)).unwrap());
    assert!(second.authenticate(0, &aes_key(AES_FF)).unwrap());
    let session = first.session().unwrap().clone();
    assert_eq!(Some(&session), second.session());

    first.read_block(0).unwrap();
    first.read_block(0).unwrap();
    let frames = first.into_inner().frames;
    let (one, two) = (&frames[frames.len() - 2], &frames[frames.len() - 1]);
    assert_eq!(one[..4], two[..4]);

    let mut expected = session.clone();
    assert_eq!(one[4..], expected.command_mac(&one[..4]).unwrap());
    expected.rctr = 1;
    assert_eq!(two[4..], expected.command_mac(&two[..4]).unwrap());
}

#[test]
fn test_wrong_or_short_keys_fail() {
    let mut plus = PlusProtocol::connect(VirtualPlus::new(32, AES_FF)).unwrap();
    assert!(!plus.authenticate(0, &aes_key([0x00; 16])).unwrap());
    assert!(plus.session().is_none());

    let frames_before = plus.into_inner().frames.len();
    let mut plus = PlusProtocol::connect(VirtualPlus::new(32, AES_FF)).unwrap();
    let crypto1 = SectorKey::from_hex("ffffffffffff", KeyType::A, "ff").unwrap();
    assert!(!plus.authenticate(0, &crypto1).unwrap());
    // a 6-byte key never reaches the card
    assert_eq!(plus.into_inner().frames.len(), frames_before - 2);
}

#[test]
fn test_refused_block_is_sentinel() {
    let mut tag = VirtualPlus::new(32, AES_FF);
    tag.refused_blocks.push(2);
    let mut plus = PlusProtocol::connect(tag).unwrap();
    assert!(plus.authenticate(0, &aes_key(AES_FF)).unwrap());
    assert_eq!(plus.read_block(2).unwrap().as_slice(), &[UNAUTHORIZED_SENTINEL]);
    // the counter still advanced, so the next read verifies
    assert_eq!(plus.read_block(3).unwrap().as_slice(), &block_pattern(3));
}

#[test]
fn test_read_without_session_is_error() {
    let mut plus = PlusProtocol::connect(VirtualPlus::new(32, AES_FF)).unwrap();
    assert!(plus.read_block(0).is_err());
}

#[test]
fn test_random_nonce_still_authenticates() {
    let mut plus = PlusProtocol::connect(VirtualPlus::new(32, AES_FF))
        .unwrap()
        .with_nonce_source(NonceSource::Random);
    assert!(plus.authenticate(0, &aes_key(AES_FF)).unwrap());
    assert_eq!(plus.read_block(1).unwrap().as_slice(), &block_pattern(1));
}

#[test]
fn test_read_plus_card_end_to_end() {
    let registry = DecoderRegistry::new();
    let reader = ClassicReader::new(&NoKeys, &registry).with_config(ScanConfig::default());
    let mut tag = VirtualPlus::new(32, AES_FF);

    let card = reader.read_plus_card(&mut tag, &mut NullFeedback, 0x0044, 0x20).unwrap();

    assert_eq!(card.sub_type(), SubType::Plus);
    assert_eq!(card.sectors().len(), 32);
    assert!(!card.is_partial_read());
    for (i, sector) in card.sectors().iter().enumerate() {
        assert!(sector.is_valid(), "sector {i}");
        assert_eq!(sector.key_a().unwrap().as_slice(), &AES_FF);
        assert_eq!(sector.block(0).unwrap().data().as_slice(), &block_pattern(i * 4));
    }
    assert_eq!(tag.mac_failures, 0);
}

#[test]
fn test_read_plus_card_needs_sl3_anticollision() {
    let registry = DecoderRegistry::new();
    let reader = ClassicReader::new(&NoKeys, &registry);
    let mut tag = VirtualPlus::new(32, AES_FF);

    assert!(reader.read_plus_card(&mut tag, &mut NullFeedback, 0x0004, 0x08).is_none());
    assert!(reader.read_plus_card(&mut tag, &mut NullFeedback, 0x0400, 0x20).is_none());
    assert!(tag.frames.is_empty());
}
