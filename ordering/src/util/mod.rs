// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

pub mod time_service;
