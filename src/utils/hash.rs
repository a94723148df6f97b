use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::constants::ARCHIVE_COPY_BUFFER_SIZE;

/// Calculate the hex SHA-256 of a file, streaming it through a fixed buffer.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; ARCHIVE_COPY_BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Base64 MD5 digest, the value of a `Content-MD5` header.
pub fn content_md5(data: &[u8]) -> String {
    BASE64_STANDARD.encode(Md5::digest(data))
}
