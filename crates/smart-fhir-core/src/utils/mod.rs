pub mod mask;

#[cfg(test)]
pub mod test_helpers;
