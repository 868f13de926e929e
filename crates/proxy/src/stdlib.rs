//! Standard-library source
//!
//! The standard library is not served by module proxies. It is published
//! here as the pseudo-module `std` from an embedded snapshot, and every
//! zip is synthesized deterministically so repeated fetches are identical.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use modsite_archive::{build_module_zip, ModuleZip};
use modsite_errors::{Error, FetchError};
use modsite_types::{version, STDLIB_MODULE_PATH};

use crate::{ModuleSource, VersionInfo};

/// Size reported for every standard-library zip. The real archive is never
/// downloaded, so admission control works from this estimate.
pub const ESTIMATED_ZIP_SIZE: u64 = 16 * 1024 * 1024;

/// Released versions in the snapshot with their tag dates (UTC).
const RELEASES: &[(&str, (i32, u32, u32))] = &[
    ("v1.19.0", (2022, 8, 2)),
    ("v1.20.0", (2023, 2, 1)),
    ("v1.21.0", (2023, 8, 8)),
];

const GO_MOD: &str = "module std\n\ngo 1.21\n";

const ERRORS_GO: &str = r#"// Copyright 2011 The Go Authors. All rights reserved.

// Package errors implements functions to manipulate errors.
package errors

// New returns an error that formats as the given text.
func New(text string) error {
	return &errorString{text}
}

type errorString struct {
	s string
}

func (e *errorString) Error() string {
	return e.s
}
"#;

const FMT_GO: &str = r#"// Package fmt implements formatted I/O with functions analogous
// to C's printf and scanf.
package fmt

import (
	"errors"
	"io"
)

// Stringer is implemented by any value that has a String method.
type Stringer interface {
	String() string
}

// Fprintln formats using the default formats and writes to w.
func Fprintln(w io.Writer, a ...any) (n int, err error) {
	return 0, errors.New("unimplemented")
}
"#;

const IO_GO: &str = r#"// Package io provides basic interfaces to I/O primitives.
package io

// Writer is the interface that wraps the basic Write method.
type Writer interface {
	Write(p []byte) (n int, err error)
}

// EOF is the error returned by Read when no more input is available.
var EOF = eofError{}

type eofError struct{}

func (eofError) Error() string { return "EOF" }
"#;

const HTTP_GO: &str = r#"// Package http provides HTTP client and server implementations.
package http

import "io"

// StatusOK is the HTTP 200 status code.
const StatusOK = 200

// ResponseWriter is used by an HTTP handler to construct a response.
type ResponseWriter interface {
	io.Writer
	WriteHeader(statusCode int)
}
"#;

const RAND_UNIX_GO: &str = r#"//go:build unix

// Package rand implements a cryptographically secure random number generator.
package rand

// Read fills b with random bytes from the operating system.
func Read(b []byte) (n int, err error) {
	return len(b), nil
}
"#;

const RAND_WINDOWS_GO: &str = r#"// Package rand implements a cryptographically secure random number generator.
package rand

// Read fills b with random bytes from the operating system.
func Read(b []byte) (n int, err error) {
	return len(b), nil
}
"#;

const CMD_GO: &str = r#"// Go is a tool for managing Go source code.
package main

func main() {}
"#;

const LICENSE: &str = "Copyright (c) 2009 The Go Authors. All rights reserved.

Redistribution and use in source and binary forms, with or without
modification, are permitted provided that the following conditions are
met:

   * Redistributions of source code must retain the above copyright
notice, this list of conditions and the following disclaimer.
   * Redistributions in binary form must reproduce the above
copyright notice, this list of conditions and the following disclaimer
in the documentation and/or other materials provided with the
distribution.
   * Neither the name of Google Inc. nor the names of its
contributors may be used to endorse or promote products derived from
this software without specific prior written permission.

THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
\"AS IS\" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
A PARTICULAR PURPOSE ARE DISCLAIMED.
";

const README: &str = "# The Go Programming Language\n\nGo is an open source programming language.\n";

/// Files of the snapshot, relative to the module root.
const FILES: &[(&str, &str)] = &[
    ("go.mod", GO_MOD),
    ("LICENSE", LICENSE),
    ("README.md", README),
    ("errors/errors.go", ERRORS_GO),
    ("fmt/print.go", FMT_GO),
    ("io/io.go", IO_GO),
    ("net/http/server.go", HTTP_GO),
    ("crypto/rand/rand_unix.go", RAND_UNIX_GO),
    ("crypto/rand/rand_windows.go", RAND_WINDOWS_GO),
    ("cmd/go/main.go", CMD_GO),
];

/// Convert a Go release tag (`go1.21`, `go1.21.3`, `go1.21rc2`) to a semantic version.
#[must_use]
pub fn semver_for_go_tag(tag: &str) -> Option<String> {
    let rest = tag.strip_prefix("go")?;
    let (release, pre) = match rest.find(|c: char| c.is_ascii_alphabetic()) {
        Some(idx) => (&rest[..idx], Some(&rest[idx..])),
        None => (rest, None),
    };
    let mut parts: Vec<&str> = release.split('.').collect();
    if parts.is_empty()
        || parts.len() > 3
        || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    let mut v = format!("v{}.{}.{}", parts[0], parts[1], parts[2]);
    if let Some(pre) = pre {
        let digits = pre.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        let word = &pre[..pre.len() - digits.len()];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        v.push_str(&format!("-{word}.{digits}"));
    }
    version::is_valid(&v).then_some(v)
}

/// Serves `std` from the embedded snapshot.
#[derive(Debug, Clone, Default)]
pub struct StdlibSource;

impl StdlibSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Versions available in the snapshot, oldest first.
    #[must_use]
    pub fn versions() -> Vec<&'static str> {
        RELEASES.iter().map(|(v, _)| *v).collect()
    }

    fn release(version: &str) -> Option<(&'static str, DateTime<Utc>)> {
        RELEASES.iter().find(|(v, _)| *v == version).and_then(|(v, (y, m, d))| {
            Utc.with_ymd_and_hms(*y, *m, *d, 0, 0, 0)
                .single()
                .map(|t| (*v, t))
        })
    }

    fn latest() -> Option<&'static str> {
        RELEASES
            .iter()
            .map(|(v, _)| *v)
            .max_by(|a, b| version::compare(a, b))
    }

    /// Resolve a requested version without I/O.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::NotFound` for unknown versions and
    /// `FetchError::InvalidArgument` for requests that are neither a version,
    /// a Go tag, nor a branch.
    pub fn resolve(requested: &str) -> Result<VersionInfo, Error> {
        let wanted = if matches!(requested, version::LATEST | version::MASTER | version::MAIN) {
            Self::latest()
                .ok_or_else(|| FetchError::not_found(STDLIB_MODULE_PATH, requested))?
                .to_string()
        } else if version::is_valid(requested) {
            requested.to_string()
        } else if let Some(v) = semver_for_go_tag(requested) {
            v
        } else {
            return Err(FetchError::InvalidArgument {
                message: format!("std@{requested}: not a valid standard library version"),
            }
            .into());
        };
        let (version, time) = Self::release(&wanted)
            .ok_or_else(|| FetchError::not_found(STDLIB_MODULE_PATH, requested))?;
        Ok(VersionInfo {
            version: version.to_string(),
            time,
        })
    }

    fn check_module(module_path: &str) -> Result<(), Error> {
        if module_path == STDLIB_MODULE_PATH {
            Ok(())
        } else {
            Err(FetchError::InvalidArgument {
                message: format!("{module_path} is not the standard library"),
            }
            .into())
        }
    }
}

#[async_trait]
impl ModuleSource for StdlibSource {
    async fn resolve_version(
        &self,
        module_path: &str,
        requested: &str,
    ) -> Result<VersionInfo, Error> {
        Self::check_module(module_path)?;
        Self::resolve(requested)
    }

    async fn zip_size(&self, module_path: &str, _version: &str) -> Result<u64, Error> {
        Self::check_module(module_path)?;
        Ok(ESTIMATED_ZIP_SIZE)
    }

    async fn fetch_zip(&self, module_path: &str, version: &str) -> Result<ModuleZip, Error> {
        Self::check_module(module_path)?;
        let info = Self::resolve(version)?;
        let data = build_module_zip(STDLIB_MODULE_PATH, &info.version, FILES)?;
        Ok(ModuleZip::open(data)?)
    }

    async fn fetch_mod(&self, module_path: &str, _version: &str) -> Result<Option<Bytes>, Error> {
        Self::check_module(module_path)?;
        Ok(Some(Bytes::from_static(GO_MOD.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_tags() {
        assert_eq!(semver_for_go_tag("go1.21").as_deref(), Some("v1.21.0"));
        assert_eq!(semver_for_go_tag("go1.21.3").as_deref(), Some("v1.21.3"));
        assert_eq!(semver_for_go_tag("go1.21rc2").as_deref(), Some("v1.21.0-rc.2"));
        assert_eq!(semver_for_go_tag("go1"), Some("v1.0.0".to_string()));
        assert!(semver_for_go_tag("1.21").is_none());
        assert!(semver_for_go_tag("go1.x").is_none());
    }

    #[test]
    fn branches_resolve_to_newest() {
        for branch in [version::MASTER, version::MAIN, version::LATEST] {
            assert_eq!(StdlibSource::resolve(branch).unwrap().version, "v1.21.0");
        }
        assert_eq!(StdlibSource::resolve("go1.20").unwrap().version, "v1.20.0");
    }

    #[test]
    fn unknown_and_invalid_versions() {
        let err = StdlibSource::resolve("v1.5.0").unwrap_err();
        assert_eq!(err.status_code(), modsite_errors::status::NOT_FOUND);
        let err = StdlibSource::resolve("not-a-version").unwrap_err();
        assert_eq!(err.status_code(), modsite_errors::status::BAD_REQUEST);
    }

    #[tokio::test]
    async fn zips_are_deterministic() {
        let source = StdlibSource::new();
        let a = source.fetch_zip("std", "v1.21.0").await.unwrap();
        let b = source.fetch_zip("std", "master").await.unwrap();
        assert_eq!(a.entries(), b.entries());
        assert!(a.contains("std@v1.21.0/errors/errors.go"));
        assert_eq!(
            source.zip_size("std", "v1.21.0").await.unwrap(),
            ESTIMATED_ZIP_SIZE
        );
    }
}
