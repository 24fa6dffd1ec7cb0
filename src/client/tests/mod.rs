//! Client behavior tests over a scripted transport.
//!
//! [`support`] provides [`support::MockTransport`], which answers POSTs from
//! a handler closure and records the JSON-RPC method of every request, so
//! tests can assert on call counts and ordering without a network.

pub mod support;

mod client_tests;
