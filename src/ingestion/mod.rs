pub mod dex_poller;
pub mod filter;
pub mod pipeline;
pub mod rates;
pub mod sink;
pub mod supervisor;
