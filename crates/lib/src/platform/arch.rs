//! CPU architecture name normalization.

/// Normalize a host-reported CPU architecture name into a canonical token.
///
/// 32-bit x86 aliases become `x86`, 64-bit x86 aliases become `x86_64`, and
/// PowerPC aliases become `ppc` (or `ppc64`). Unknown names are lower-cased
/// and passed through.
pub fn normalize_arch(name: &str) -> String {
  let lower = name.trim().to_lowercase();
  let canonical = match lower.as_str() {
    "i386" | "i486" | "i586" | "i686" | "x86" => "x86",
    "amd64" | "x86_64" | "x64" => "x86_64",
    "powerpc" | "ppc" => "ppc",
    "powerpc64" | "ppc64" => "ppc64",
    "arm64" | "aarch64" => "aarch64",
    _ => return lower,
  };
  canonical.to_string()
}

/// Returns the normalized architecture of the CPU this binary runs on.
pub fn current() -> String {
  normalize_arch(std::env::consts::ARCH)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn x86_aliases() {
    assert_eq!(normalize_arch("i386"), "x86");
    assert_eq!(normalize_arch("i686"), "x86");
    assert_eq!(normalize_arch("amd64"), "x86_64");
    assert_eq!(normalize_arch("X86_64"), "x86_64");
  }

  #[test]
  fn powerpc_aliases() {
    assert_eq!(normalize_arch("powerpc"), "ppc");
    assert_eq!(normalize_arch("PowerPC64"), "ppc64");
  }

  #[test]
  fn unknown_names_pass_through_lowercased() {
    assert_eq!(normalize_arch("SPARC"), "sparc");
    assert_eq!(normalize_arch("riscv64"), "riscv64");
  }
}
