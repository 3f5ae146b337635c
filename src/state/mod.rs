// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Cache transports and the typed cache-aside accessor

pub mod cache;
pub mod memory_cache;
pub mod redis_cache;

pub use cache::{cache_key, CacheAccessor, CacheBackend, CacheSettings, EntityKind};
pub use memory_cache::MemoryCache;
pub use redis_cache::RedisCache;
