// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Library entry exposing the rewriter, its encoder oracles and the CLI layer.
pub mod cli;
pub mod oracle;
pub mod rewriter;
