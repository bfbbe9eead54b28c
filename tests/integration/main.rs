//! Integration tests: the macro engine driven end to end through mock
//! collaborators.

mod mock_platform;
mod simulation;
