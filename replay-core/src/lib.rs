pub mod envelope;
pub mod event;
pub mod fragment;
pub mod retry;
pub mod session;
pub mod sink;
pub mod store;
pub mod task {
    pub mod context;
    pub mod runner;
    pub mod arm {
        pub mod config;
        pub mod processor;
    }
    pub mod filter {
        pub mod config;
        pub mod processor;
    }
    pub mod log {
        pub mod config;
        pub mod processor;
    }
    pub mod publish {
        pub mod config;
        pub mod processor;
    }
    pub mod replay {
        pub mod config;
        pub mod processor;
    }
    pub mod trigger {
        pub mod config;
        pub mod subscriber;
    }
}
