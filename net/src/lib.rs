// Copyright 2018 The Sia Developers
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

//! Connection plumbing shared by the negotiation protocols: a deadline
//! carrying connection trait, length-prefixed object framing, the typed
//! accept/reject/stop responses, and packet-shaped bandwidth limiting.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

use sia_core as core;

pub mod msg;
pub mod rate_limit;
pub mod types;

pub use crate::msg::{
	read_acceptance, read_object, read_string, write_acceptance, write_object, write_rejection,
	write_stop, write_string, ACCEPT_RESPONSE, STOP_RESPONSE,
};
pub use crate::rate_limit::{RateLimit, Throttled, ThrottledReader, ThrottledWriter};
pub use crate::types::{Conn, Error};
