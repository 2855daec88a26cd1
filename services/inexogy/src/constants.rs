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

// Env values used by the inexogy service.
pub const INEXOGY_CLIENT: &str = "INEXOGY_CLIENT";
pub const INEXOGY_EMAIL: &str = "INEXOGY_EMAIL";
pub const INEXOGY_PASSWORD: &str = "INEXOGY_PASSWORD";
pub const INEXOGY_BASE_URL: &str = "INEXOGY_BASE_URL";
pub const INEXOGY_CACHE_DIR: &str = "INEXOGY_CACHE_DIR";
pub const INEXOGY_TTL: &str = "INEXOGY_TTL";
pub const INEXOGY_METERS_TTL: &str = "INEXOGY_METERS_TTL";
pub const INEXOGY_ACCEPT_INVALID_CERTS: &str = "INEXOGY_ACCEPT_INVALID_CERTS";

// Env values for a pre-obtained token, bypassing the handshake.
pub const INEXOGY_CONSUMER_KEY: &str = "INEXOGY_CONSUMER_KEY";
pub const INEXOGY_CONSUMER_SECRET: &str = "INEXOGY_CONSUMER_SECRET";
pub const INEXOGY_TOKEN: &str = "INEXOGY_TOKEN";
pub const INEXOGY_TOKEN_SECRET: &str = "INEXOGY_TOKEN_SECRET";

pub const DEFAULT_BASE_URL: &str = "https://api.inexogy.com/public/v1";

// Cache scopes; the resulting file names are a cross-process interface.
pub const OAUTH_CACHE_SCOPE: &str = "oauth";
pub const METERS_CACHE_SCOPE: &str = "meters";

// Both the whole-handshake retry and the catalog fetch retry use the same
// budget: 5 attempts with a linear backoff of `attempt` seconds in between.
pub const MAX_ATTEMPTS: u64 = 5;

pub const DEFAULT_METERS_TTL: i64 = 3600;
