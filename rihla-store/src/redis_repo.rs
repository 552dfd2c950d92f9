use redis::RedisResult;

/// Redis connection used for fixed-window rate limiting.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Counts a hit against `key`; true while the window's count is within `limit`.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

/// Rate-limit key for one client address in the current window.
pub fn rate_limit_key(client: &str, window_seconds: i64, now_seconds: i64) -> String {
    let window = now_seconds / window_seconds.max(1);
    format!("rl:{}:{}", client, window)
}
