use super::TokenProvider;
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Hands out a fixed bearer token; used where no token endpoint is available.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
    call_count: Arc<Mutex<usize>>,
}

impl StaticTokenProvider {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        *self.call_count.lock().unwrap() += 1;
        Ok(self.token.clone())
    }
}
