use redis::RedisResult;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns true while the caller is within `limit`.
    /// The window starts at the first hit and is not extended by later ones.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let (count,): (i64,) = window_pipeline(key, window_seconds).query_async(&mut conn).await?;
        Ok(count <= limit)
    }
}

/// `SET key 0 EX window NX` then `INCR key`: the TTL is only set when the key is created.
fn window_pipeline(key: &str, window_seconds: i64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("EX")
        .arg(window_seconds)
        .arg("NX")
        .ignore()
        .incr(key, 1);
    pipe
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_window_expiry_is_only_set_on_creation() {
        let packed = window_pipeline("ratelimit:10.0.0.1", 60).get_packed_pipeline();
        assert!(contains(&packed, b"NX"));
        assert!(contains(&packed, b"INCR"));
        assert!(!contains(&packed, b"EXPIRE"));
    }
}
