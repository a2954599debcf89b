// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tenant resolution for public endpoints.
//!
//! A request names its tenant either with an explicit `X-Tenant-Id` header
//! or through the subdomain of its `Host` (`alnoor.smartkindy.com`).
//! Settings are cached per instance so inbound webhooks do not hit
//! Firestore on every message.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::TenantSettings;
use axum::http::{header, HeaderMap};
use dashmap::DashMap;
use std::time::{Duration, Instant};

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Subdomains that never name a tenant.
const RESERVED_SUBDOMAINS: &[&str] = &["www", "api"];

/// How a request identified its tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantKey {
    Id(String),
    Slug(String),
}

/// Extract the tenant key from request headers.
pub fn tenant_key(headers: &HeaderMap, base_domain: &str) -> Option<TenantKey> {
    let explicit = headers
        .get(TENANT_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(id) = explicit {
        return Some(TenantKey::Id(id.to_string()));
    }

    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .and_then(|host| subdomain_of(host, base_domain))
        .map(TenantKey::Slug)
}

/// The single label in front of `base_domain`, if any.
///
/// Ports are ignored. Nested subdomains and reserved labels do not count.
pub fn subdomain_of(host: &str, base_domain: &str) -> Option<String> {
    let host = host.split(':').next()?.trim().to_ascii_lowercase();
    let base = base_domain.trim().trim_start_matches('.').to_ascii_lowercase();
    if base.is_empty() {
        return None;
    }

    let label = host.strip_suffix(&base)?.strip_suffix('.')?;
    if label.is_empty() || label.contains('.') || RESERVED_SUBDOMAINS.contains(&label) {
        return None;
    }
    Some(label.to_string())
}

/// How long cached settings are trusted before they are reloaded.
pub const DEFAULT_TENANT_CACHE_TTL: Duration = Duration::from_secs(300);

struct CachedTenant {
    settings: TenantSettings,
    loaded_at: Instant,
}

/// Read-through cache of tenant settings, keyed by tenant ID with a slug
/// index.
///
/// Entries expire after `ttl`, so rotated webhook secrets and edited
/// templates take effect without a restart.
pub struct TenantCache {
    by_id: DashMap<String, CachedTenant>,
    slugs: DashMap<String, String>,
    ttl: Duration,
}

impl Default for TenantCache {
    fn default() -> Self {
        Self::new(DEFAULT_TENANT_CACHE_TTL)
    }
}

impl TenantCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            by_id: DashMap::new(),
            slugs: DashMap::new(),
            ttl,
        }
    }

    pub fn insert(&self, settings: TenantSettings) {
        if let Some(previous) = self.by_id.get(&settings.tenant_id) {
            if previous.settings.slug != settings.slug {
                self.slugs.remove(&previous.settings.slug);
            }
        }
        self.slugs
            .insert(settings.slug.clone(), settings.tenant_id.clone());
        self.by_id.insert(
            settings.tenant_id.clone(),
            CachedTenant {
                settings,
                loaded_at: Instant::now(),
            },
        );
    }

    /// Fresh cached settings; expired entries are dropped.
    pub fn get(&self, key: &TenantKey) -> Option<TenantSettings> {
        let id = match key {
            TenantKey::Id(id) => id.clone(),
            TenantKey::Slug(slug) => self.slugs.get(slug)?.value().clone(),
        };

        match self.by_id.get(&id) {
            Some(entry) if entry.loaded_at.elapsed() < self.ttl => {
                return Some(entry.settings.clone())
            }
            Some(_) => {}
            None => return None,
        }

        tracing::debug!(tenant_id = %id, "Tenant settings expired");
        self.invalidate(&id);
        None
    }

    /// Drop a tenant so the next lookup reloads it.
    pub fn invalidate(&self, tenant_id: &str) {
        if let Some((_, cached)) = self.by_id.remove(tenant_id) {
            self.slugs.remove(&cached.settings.slug);
        }
    }

    /// Cached settings, or load them from Firestore.
    pub async fn resolve(&self, db: &FirestoreDb, key: &TenantKey) -> Result<TenantSettings> {
        if let Some(settings) = self.get(key) {
            return Ok(settings);
        }

        let loaded = match key {
            TenantKey::Id(id) => db.get_tenant_settings(id).await?,
            TenantKey::Slug(slug) => db.find_tenant_by_slug(slug).await?,
        };

        let settings = loaded.ok_or_else(|| AppError::NotFound("Tenant not found".to_string()))?;
        tracing::debug!(tenant_id = %settings.tenant_id, "Tenant settings cached");
        self.insert(settings.clone());
        Ok(settings)
    }
}
