// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod content;
mod enumeration;
mod evaluation;
mod sqlite;
mod support;
