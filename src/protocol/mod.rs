//! The DNS data model needed to read referrals: names, classes, and
//! the `NS` and address records of the authority and additional
//! sections.  Parsing these off the wire is somebody else's job.

pub mod types;
