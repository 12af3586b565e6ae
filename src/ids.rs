use rand::Rng;

use crate::config::{PLAYER_ID_LEN, PLAYER_ID_PREFIX, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};

pub type RoomId = String;
pub type PlayerId = String;

/// Short, human-enterable room code. Uniqueness is checked by the registry.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> RoomId {
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Opaque player id, e.g. `player_k3j9x0a2b`.
pub fn generate_player_id() -> PlayerId {
    const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..PLAYER_ID_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{PLAYER_ID_PREFIX}{suffix}")
}

/// Codes are typed by hand, so accept any case and stray whitespace.
pub fn normalize_room_code(code: &str) -> RoomId {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_code_shape() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = generate_room_code(&mut rng);
            assert_eq!(code.len(), ROOM_CODE_LEN);
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
            assert!(!code.contains('O') && !code.contains('0') && !code.contains('1'));
        }
    }

    #[test]
    fn test_player_id_shape() {
        let id = generate_player_id();
        assert!(id.starts_with(PLAYER_ID_PREFIX));
        assert_eq!(id.len(), PLAYER_ID_PREFIX.len() + PLAYER_ID_LEN);
        assert_ne!(id, generate_player_id());
    }

    #[test]
    fn test_normalize_room_code() {
        assert_eq!(normalize_room_code("  bcd23z "), "BCD23Z");
    }
}
