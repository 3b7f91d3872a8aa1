//-
// Copyright (c) 2026, The Mapistream Authors
//
// This file is part of Mapistream.
//
// Mapistream is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mapistream is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Mapistream. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::Error;
use crate::fifo::buffer::DEFAULT_CAPACITY;

/// The system-wide configuration for Mapistream.
///
/// This is stored in a file named `mapistream.toml` under the Mapistream
/// root, which is typically `/usr/local/etc/mapistream` or
/// `/etc/mapistream`. Every section is optional.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct SystemConfig {
    /// Options for the FIFO buffers between producers and consumers.
    #[serde(default)]
    pub fifo: FifoConfig,

    /// Options for the `encode` and `decode` pipelines.
    #[serde(default)]
    pub pipe: PipeConfig,

    #[serde(default)]
    pub diagnostic: DiagnosticConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct FifoConfig {
    /// The maximum number of bytes buffered between the producer and the
    /// consumer of a stream.
    pub capacity: usize,

    /// How long, in milliseconds, one side of a stream waits for the other
    /// before giving up.
    ///
    /// 0 means to wait forever.
    pub timeout_ms: u64,
}

impl Default for FifoConfig {
    fn default() -> Self {
        FifoConfig {
            capacity: DEFAULT_CAPACITY,
            timeout_ms: 600_000,
        }
    }
}

impl FifoConfig {
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PipeConfig {
    /// The maximum size of a record produced by `encode`.
    pub chunk_size: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        PipeConfig { chunk_size: 65536 }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DiagnosticConfig {
    /// If set, redirect standard error to this file on startup.
    ///
    /// This is useful for capturing panics when standard error would
    /// otherwise be discarded. A relative path is resolved against the
    /// Mapistream root.
    #[serde(default)]
    pub stderr: Option<PathBuf>,
}

impl SystemConfig {
    /// Read and validate the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let mut toml = Vec::new();
        fs::File::open(path)?.read_to_end(&mut toml)?;
        let config: SystemConfig = toml::from_slice(&toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if 0 == self.fifo.capacity {
            return Err(Error::Config("fifo.capacity must be non-zero"));
        }

        if 0 == self.pipe.chunk_size {
            return Err(Error::Config("pipe.chunk_size must be non-zero"));
        }

        if self.pipe.chunk_size > crate::fifo::record::MAX_RECORD as usize {
            return Err(Error::Config("pipe.chunk_size is too large"));
        }

        Ok(())
    }
}
