pub mod skeleton;
