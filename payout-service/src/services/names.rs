//! Stable display pseudonyms for partners shown on public surfaces.

use sha2::{Digest, Sha256};
use uuid::Uuid;

const ADJECTIVES: [&str; 32] = [
    "Amber", "Bold", "Brave", "Bright", "Calm", "Clever", "Cosmic", "Crimson", "Daring", "Eager",
    "Electric", "Fearless", "Gentle", "Golden", "Happy", "Jolly", "Keen", "Lively", "Lucky",
    "Mighty", "Nimble", "Noble", "Quick", "Quiet", "Rapid", "Silver", "Sly", "Sunny", "Swift",
    "Vivid", "Wild", "Witty",
];

const ANIMALS: [&str; 32] = [
    "Badger", "Bear", "Beaver", "Bison", "Cheetah", "Crane", "Dolphin", "Eagle", "Falcon", "Fox",
    "Gecko", "Heron", "Jaguar", "Koala", "Lemur", "Leopard", "Lynx", "Marten", "Mole", "Otter",
    "Owl", "Panda", "Panther", "Penguin", "Puffin", "Rabbit", "Raven", "Seal", "Tiger", "Walrus",
    "Wolf", "Yak",
];

/// "Adjective Animal" for the given id. The same id always yields the same name.
pub fn pseudonym(id: Uuid) -> String {
    let digest = Sha256::digest(id.as_bytes());
    let adjective = ADJECTIVES[usize::from(digest[0]) % ADJECTIVES.len()];
    let animal = ANIMALS[usize::from(digest[1]) % ANIMALS.len()];
    format!("{} {}", adjective, animal)
}
