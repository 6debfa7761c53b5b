//! Completion cache keyed by request fingerprint.
//!
//! Generated code for the same question against the same model is stable
//! enough to reuse; caching keeps repeated demo questions from burning
//! through API quota.

use std::{fs, path::PathBuf};

use anyhow::Result;

use crate::{config::Config, llm::ChatMessage};

#[derive(Debug, Clone)]
pub struct RequestCache {
    length: usize,
    cache_path: PathBuf,
}

impl RequestCache {
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.cache_path(), cfg.get_usize("CACHE_LENGTH").unwrap_or(100))
    }

    pub fn new(cache_path: PathBuf, length: usize) -> Self {
        let _ = fs::create_dir_all(&cache_path);
        Self { length, cache_path }
    }

    pub fn key_for(
        &self,
        base_url: &str,
        model: &str,
        temperature: f32,
        top_p: f32,
        messages: &[ChatMessage],
    ) -> String {
        let payload = serde_json::json!({
            "base_url": base_url,
            "model": model,
            "temperature": temperature,
            "top_p": top_p,
            "messages": messages,
        });
        let data = serde_json::to_vec(&payload).unwrap_or_default();
        let digest = md5::compute(data);
        format!("{:x}", digest)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let p = self.cache_path.join(key);
        fs::read_to_string(p).ok()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let p = self.cache_path.join(key);
        fs::write(p, value)?;
        self.prune()?;
        Ok(())
    }

    fn prune(&self) -> Result<()> {
        let mut entries: Vec<_> = fs::read_dir(&self.cache_path)?
            .filter_map(|e| e.ok())
            .collect();
        entries.sort_by_key(|e| e.metadata().and_then(|m| m.modified()).ok());
        if entries.len() > self.length {
            let to_delete = entries.len() - self.length;
            for entry in entries.iter().take(to_delete) {
                let _ = fs::remove_file(entry.path());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, Role};

    #[test]
    fn identical_requests_share_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RequestCache::new(dir.path().to_path_buf(), 10);
        let msgs = vec![ChatMessage::new(Role::User, "average by gender".into())];
        let k1 = cache.key_for("https://api", "gpt-4o", 0.0, 1.0, &msgs);
        let k2 = cache.key_for("https://api", "gpt-4o", 0.0, 1.0, &msgs);
        assert_eq!(k1, k2);
        let other = vec![ChatMessage::new(Role::User, "histogram of age".into())];
        assert_ne!(k1, cache.key_for("https://api", "gpt-4o", 0.0, 1.0, &other));
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RequestCache::new(dir.path().to_path_buf(), 10);
        assert!(cache.get("k").is_none());
        cache.set("k", "```python\nprint(1)\n```").unwrap();
        assert_eq!(cache.get("k").unwrap(), "```python\nprint(1)\n```");
    }

    #[test]
    fn prune_keeps_at_most_length_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RequestCache::new(dir.path().to_path_buf(), 2);
        cache.set("a", "1").unwrap();
        cache.set("b", "2").unwrap();
        cache.set("c", "3").unwrap();
        let remaining = std::fs::read_dir(dir.path()).unwrap().count();
        assert!(remaining <= 2);
    }
}
