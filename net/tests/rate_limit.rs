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

use sia_net as net;

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use net::{Conn, RateLimit, Throttled, ThrottledReader, ThrottledWriter};

#[test]
fn write_takes_at_least_the_paced_time() {
	// 8 packets of 64 bytes at 100 packets/s: at least ~80ms of pacing
	let limit = RateLimit {
		packet_size: 64,
		packets_per_second: 100,
	};
	let data = vec![0xAAu8; 8 * 64];

	let mut writer = ThrottledWriter::new(Vec::new(), limit);
	let start = Instant::now();
	writer.write_all(&data).unwrap();
	let elapsed = start.elapsed();

	// N / (packet_size * pps) seconds, with slack for timer granularity
	assert!(
		elapsed >= Duration::from_millis(60),
		"throttled write finished too fast: {:?}",
		elapsed
	);
	assert_eq!(writer.into_inner(), data);
}

#[test]
fn read_takes_at_least_the_paced_time() {
	let limit = RateLimit {
		packet_size: 64,
		packets_per_second: 100,
	};
	let data = vec![0xBBu8; 8 * 64];

	let mut reader = ThrottledReader::new(&data[..], limit);
	let mut out = vec![];
	let start = Instant::now();
	reader.read_to_end(&mut out).unwrap();
	let elapsed = start.elapsed();

	assert!(
		elapsed >= Duration::from_millis(60),
		"throttled read finished too fast: {:?}",
		elapsed
	);
	assert_eq!(out, data);
}

#[test]
fn zero_packets_per_second_disables_the_limit() {
	let data = vec![0xCCu8; 1 << 20];

	let mut writer = ThrottledWriter::new(Vec::new(), RateLimit::unlimited());
	let start = Instant::now();
	writer.write_all(&data).unwrap();

	// a megabyte through a disabled limiter takes no measurable pacing
	assert!(start.elapsed() < Duration::from_millis(500));
	assert_eq!(writer.into_inner().len(), data.len());
}

#[test]
fn throttled_connection_paces_and_passes_through() {
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let addr = listener.local_addr().unwrap();

	let echo = thread::spawn(move || {
		let (mut conn, _) = listener.accept().unwrap();
		let mut buf = vec![0u8; 4 * 64];
		conn.read_exact(&mut buf).unwrap();
		conn.write_all(&buf).unwrap();
	});

	let limit = RateLimit {
		packet_size: 64,
		packets_per_second: 100,
	};
	let stream = TcpStream::connect(addr).unwrap();
	let mut conn = Throttled::new(stream, limit, limit);

	// deadlines and addresses reach the wrapped stream
	conn.set_deadline(Some(Duration::from_secs(10))).unwrap();
	assert_eq!(conn.peer_addr().unwrap(), addr);

	let data = vec![0xEEu8; 4 * 64];
	let start = Instant::now();
	conn.write_all(&data).unwrap();
	let mut back = vec![0u8; data.len()];
	conn.read_exact(&mut back).unwrap();

	// both directions paced: 4 packets each way at 100/s
	assert!(
		start.elapsed() >= Duration::from_millis(50),
		"throttled round trip finished too fast: {:?}",
		start.elapsed()
	);
	assert_eq!(back, data);
	echo.join().unwrap();
}

#[test]
fn writes_are_split_on_packet_boundaries() {
	let limit = RateLimit {
		packet_size: 10,
		packets_per_second: 10_000,
	};
	let mut writer = ThrottledWriter::new(Vec::new(), limit);

	// a single write call moves at most one packet
	let n = writer.write(&[0u8; 64]).unwrap();
	assert_eq!(n, 10);
}
