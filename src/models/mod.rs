pub mod service_model;
