//! Chunk decryption using AES in CFB mode.
//!
//! Depot chunks use full-block (128-bit segment) CFB with a zero IV. The key
//! comes from the depot key table; its length selects AES-128/192/256.

use cipher::{AsyncStreamCipher, KeyIvInit};

use crate::{Error, Result};

type Aes128CfbDec = cfb_mode::Decryptor<aes::Aes128>;
type Aes192CfbDec = cfb_mode::Decryptor<aes::Aes192>;
type Aes256CfbDec = cfb_mode::Decryptor<aes::Aes256>;

/// The initialization vector (all zeros).
const CHUNK_AES_IV: [u8; 16] = [0u8; 16];

/// Decrypt chunk data in place.
///
/// CFB is a stream mode, so any data length is accepted and the output is
/// the same length as the input.
pub fn decrypt_in_place(key: &[u8], data: &mut [u8]) -> Result<()> {
    let invalid = |_| Error::InvalidKeyLength(key.len());

    match key.len() {
        16 => Aes128CfbDec::new_from_slices(key, &CHUNK_AES_IV)
            .map_err(invalid)?
            .decrypt(data),
        24 => Aes192CfbDec::new_from_slices(key, &CHUNK_AES_IV)
            .map_err(invalid)?
            .decrypt(data),
        32 => Aes256CfbDec::new_from_slices(key, &CHUNK_AES_IV)
            .map_err(invalid)?
            .decrypt(data),
        other => return Err(Error::InvalidKeyLength(other)),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{encrypt, KEY_128};

    #[test]
    fn test_decrypt_all_key_sizes() {
        let plain: Vec<u8> = (0..100u8).collect();

        for key_len in [16, 24, 32] {
            let key: Vec<u8> = (0..key_len as u8).collect();
            let mut data = encrypt(&key, &plain);
            assert_ne!(data, plain);

            decrypt_in_place(&key, &mut data).unwrap();
            assert_eq!(data, plain, "key length {key_len}");
        }
    }

    #[test]
    fn test_decrypt_partial_block() {
        let plain = b"seventeen bytes!!";
        let mut data = encrypt(&KEY_128, plain);

        decrypt_in_place(&KEY_128, &mut data).unwrap();
        assert_eq!(&data, plain);
    }

    #[test]
    fn test_prefix_decrypts_independently() {
        let plain: Vec<u8> = (0..64u8).collect();
        let cipher = encrypt(&KEY_128, &plain);

        let mut prefix = cipher[..20].to_vec();
        decrypt_in_place(&KEY_128, &mut prefix).unwrap();
        assert_eq!(prefix, &plain[..20]);
    }

    #[test]
    fn test_invalid_key_length() {
        let mut data = vec![0u8; 16];
        assert!(matches!(
            decrypt_in_place(&[0u8; 15], &mut data),
            Err(Error::InvalidKeyLength(15))
        ));
    }

    #[test]
    fn test_decrypt_empty() {
        let mut data: [u8; 0] = [];
        decrypt_in_place(&KEY_128, &mut data).unwrap();
    }
}
