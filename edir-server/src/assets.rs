use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;

use crate::Error;

/// Uploads at most this large are accepted; the limit itself is inclusive.
pub const MAX_AUDIO_BYTES: u64 = 10 * 1024 * 1024;

const ALLOWED_MIME: [&str; 2] = ["audio/webm", "audio/mpeg"];

/// Stored audio paths are returned relative to this public prefix and kept
/// verbatim on the feedback record.
pub const PUBLIC_PREFIX: &str = "/uploads/feedback";

/// On-disk store for uploaded feedback audio. Shared across all concurrent
/// uploads; name collisions are avoided by the unique prefix, not locking.
#[derive(Clone, Debug)]
pub struct AssetStore {
    dir: PathBuf,
}

impl AssetStore {
    pub fn new(dir: PathBuf) -> AssetStore {
        AssetStore { dir }
    }

    /// Validates and writes one uploaded audio blob, returning the relative
    /// path to store on the feedback record. The directory is created lazily
    /// on first store.
    pub async fn store(
        &self,
        original_name: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<String, Error> {
        if !ALLOWED_MIME.contains(&mime) {
            return Err(Error::unsupported_media_type(mime));
        }
        if bytes.len() as u64 > MAX_AUDIO_BYTES {
            return Err(Error::payload_too_large(bytes.len() as u64));
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating upload directory {:?}", self.dir))?;
        let name = format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            rand::random::<u32>(),
            sanitize_filename(original_name),
        );
        let path = self.dir.join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing uploaded audio to {:?}", path))?;
        Ok(format!("{}/{}", PUBLIC_PREFIX, name))
    }

    /// Exact-filename lookup under the asset directory.
    pub async fn retrieve(&self, filename: &str) -> Result<Vec<u8>, Error> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(Error::audio_not_found(filename));
        }
        match tokio::fs::read(self.dir.join(filename)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::audio_not_found(filename))
            }
            Err(e) => Err(Error::Anyhow(
                anyhow::Error::new(e).context(format!("reading audio file {:?}", filename)),
            )),
        }
    }
}

/// Both accepted upload types must be servable; the stored extension decides.
pub fn content_type_for(filename: &str) -> &'static str {
    let mpeg = [".mp3", ".mpeg", ".mpga"];
    match mpeg.iter().any(|ext| filename.ends_with(ext)) {
        true => "audio/mpeg",
        false => "audio/webm",
    }
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use edir_api::Error as ApiError;

    use super::*;

    fn store_in(tmp: &tempfile::TempDir) -> AssetStore {
        AssetStore::new(tmp.path().join("uploads"))
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips() {
        let tmp = tempfile::tempdir().expect("creating tempdir");
        let store = store_in(&tmp);
        let path = store
            .store("recording.webm", "audio/webm", b"webm bytes")
            .await
            .expect("storing audio");
        let filename = path
            .strip_prefix(&format!("{}/", PUBLIC_PREFIX))
            .expect("stored path has the public prefix");
        assert!(filename.ends_with("-recording.webm"));
        let bytes = store.retrieve(filename).await.expect("retrieving audio");
        assert_eq!(bytes, b"webm bytes");
    }

    #[tokio::test]
    async fn upload_directory_is_created_lazily() {
        let tmp = tempfile::tempdir().expect("creating tempdir");
        let store = store_in(&tmp);
        assert!(!tmp.path().join("uploads").exists());
        store
            .store("a.mp3", "audio/mpeg", b"mp3 bytes")
            .await
            .expect("storing audio");
        assert!(tmp.path().join("uploads").exists());
    }

    #[tokio::test]
    async fn size_limit_is_inclusive() {
        let tmp = tempfile::tempdir().expect("creating tempdir");
        let store = store_in(&tmp);

        let at_limit = vec![0u8; MAX_AUDIO_BYTES as usize];
        assert!(store.store("a.webm", "audio/webm", &at_limit).await.is_ok());

        let over_limit = vec![0u8; MAX_AUDIO_BYTES as usize + 1];
        match store.store("b.webm", "audio/webm", &over_limit).await {
            Err(Error::Api(ApiError::PayloadTooLarge(size))) => {
                assert_eq!(size, MAX_AUDIO_BYTES + 1)
            }
            other => panic!("expected PayloadTooLarge, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn rejects_non_audio_mime_regardless_of_size() {
        let tmp = tempfile::tempdir().expect("creating tempdir");
        let store = store_in(&tmp);
        match store.store("clip.mp4", "video/mp4", b"tiny").await {
            Err(Error::Api(ApiError::UnsupportedMediaType(mime))) => {
                assert_eq!(mime, "video/mp4")
            }
            other => panic!("expected UnsupportedMediaType, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn refuses_path_traversal_on_retrieve() {
        let tmp = tempfile::tempdir().expect("creating tempdir");
        let store = store_in(&tmp);
        for name in ["../secret", "a/b.webm", "..", "c\\d.mp3"] {
            assert!(matches!(
                store.retrieve(name).await,
                Err(Error::Api(ApiError::AudioNotFound(_)))
            ));
        }
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().expect("creating tempdir");
        let store = store_in(&tmp);
        assert!(matches!(
            store.retrieve("123-gone.webm").await,
            Err(Error::Api(ApiError::AudioNotFound(_)))
        ));
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("1-2-song.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("1-2-song.mpeg"), "audio/mpeg");
        assert_eq!(content_type_for("1-2-song.mpga"), "audio/mpeg");
        assert_eq!(content_type_for("1-2-clip.webm"), "audio/webm");
        assert_eq!(content_type_for("no-extension"), "audio/webm");
    }
}
