#![cfg(all(feature = "test-utils", feature = "failpoints"))]

mod coordinator_test;
