// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::Credential;
use async_trait::async_trait;
use metersign_core::{Context, ProvideCredential, Result};

/// StaticCredentialProvider provides a handshake result directly.
///
/// This provider is used when the four token strings were obtained elsewhere
/// (another process, an earlier run) and should be reused without any dynamic
/// loading.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

impl StaticCredentialProvider {
    /// Create a new StaticCredentialProvider from the four token strings.
    pub fn new(consumer_key: &str, consumer_secret: &str, token: &str, token_secret: &str) -> Self {
        Self {
            credential: Credential {
                consumer_key: consumer_key.to_string(),
                consumer_secret: consumer_secret.to_string(),
                token: token.to_string(),
                token_secret: token_secret.to_string(),
            },
        }
    }
}

#[async_trait]
impl ProvideCredential for StaticCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
        Ok(Some(self.credential.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credential_provider() -> Result<()> {
        let provider = StaticCredentialProvider::new("ck", "cs", "t", "ts");
        let cred = provider.provide_credential(&Context::new()).await?;

        let cred = cred.expect("credential must be present");
        assert_eq!(cred.consumer_key, "ck");
        assert_eq!(cred.signing_secret(), "cs&ts");

        Ok(())
    }
}
