//! Test helpers for the Volcengine API

use super::{Client, Credentials};

pub fn create_test_client(url: &str) -> Client {
    Client::new(url, "cn-beijing", Credentials::new("test-ak", "test-sk"), false).unwrap()
}
