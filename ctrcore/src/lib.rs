// statistics module
pub mod statistics {
    pub mod histogram;
    pub mod model;
    pub mod chi;
    pub mod bootstrap;
}

// fitting module
pub mod fitting {
    pub mod gaussian;
    pub mod peakdetect;
    pub mod error;
}
