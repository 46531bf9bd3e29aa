pub mod path_resolver;
