//! Expression evaluator (component C10).
//!
//! Dispatches on the expression's prefix to the symbol table, a regex over
//! symbol names, the printer, or DWARF's `pc -> file:line` lookup (spec
//! §4.9). `resolve_breakpoint_addresses` reuses the `re:` branch for the
//! `Breakpoint` request's address expression (spec §5 supplement), so a
//! bare name and a `re:`-prefixed pattern both work in both places.

use crate::error::{invalid_request, Error};
use rdbg_trace::{Address, DwarfInfo, SymbolResolver, ValuePrinter};

pub fn eval(
    expr: &str,
    symbols: &dyn SymbolResolver,
    dwarf: &dyn DwarfInfo,
    printer: &dyn ValuePrinter,
) -> Result<Vec<String>, Error> {
    if let Some(pattern) = expr.strip_prefix("re:") {
        let re = regex::Regex::new(pattern)
            .map_err(|e| invalid_request(format!("bad regex {pattern:?}: {e}")))?;
        return Ok(symbols.names_matching(&re));
    }

    if let Some(name) = expr.strip_prefix("addr:") {
        let pc = symbols
            .pc_of(name)
            .ok_or_else(|| invalid_request(format!("unknown symbol {name:?}")))?;
        return Ok(vec![format!("{pc:#x}")]);
    }

    if let Some(sub) = expr.strip_prefix("val:") {
        let addr = eval_address(sub, symbols)?;
        return Ok(vec![printer.format_at(addr, None)]);
    }

    if let Some(num) = expr.strip_prefix("src:") {
        let addr = parse_address(num)
            .ok_or_else(|| invalid_request(format!("bad address {num:?}")))?;
        let loc = dwarf
            .pc_to_file_line(addr)
            .ok_or_else(|| invalid_request(format!("no source location for {addr:#x}")))?;
        return Ok(vec![loc]);
    }

    if expr.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        let addr =
            parse_address(expr).ok_or_else(|| invalid_request(format!("bad address {expr:?}")))?;
        let name = symbols
            .name_at(addr)
            .ok_or_else(|| invalid_request(format!("no symbol at {addr:#x}")))?;
        return Ok(vec![name]);
    }

    Err(invalid_request("bad expression syntax"))
}

/// `evalAddress` from spec §4.9: symbol lookup first, then a numeric
/// parse accepting 0x/0o/0b/decimal, erroring if both fail.
pub fn eval_address(expr: &str, symbols: &dyn SymbolResolver) -> Result<Address, Error> {
    if let Some(pc) = symbols.pc_of(expr) {
        return Ok(pc);
    }
    parse_address(expr).ok_or_else(|| invalid_request(format!("bad expression syntax: {expr:?}")))
}

fn parse_address(s: &str) -> Option<Address> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return Address::from_str_radix(hex, 16).ok();
    }
    if let Some(oct) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        return Address::from_str_radix(oct, 8).ok();
    }
    if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        return Address::from_str_radix(bin, 2).ok();
    }
    s.parse().ok()
}

/// Resolves a `Breakpoint.address` expression to one or more PCs (spec §6:
/// "address may resolve to multiple PCs via regex").
pub fn resolve_breakpoint_addresses(
    expr: &str,
    symbols: &dyn SymbolResolver,
) -> Result<Vec<Address>, Error> {
    if let Some(pattern) = expr.strip_prefix("re:") {
        let re = regex::Regex::new(pattern)
            .map_err(|e| invalid_request(format!("bad regex {pattern:?}: {e}")))?;
        let addresses: Vec<Address> = symbols
            .names_matching(&re)
            .into_iter()
            .filter_map(|name| symbols.pc_of(&name))
            .collect();
        if addresses.is_empty() {
            return Err(invalid_request(format!("no symbols match {pattern:?}")));
        }
        return Ok(addresses);
    }

    Ok(vec![eval_address(expr, symbols)?])
}

#[cfg(test)]
mod test {
    use super::*;
    use rdbg_trace::DieHandle;

    struct FakeSymbols;
    impl SymbolResolver for FakeSymbols {
        fn pc_of(&self, name: &str) -> Option<Address> {
            match name {
                "main.foo" => Some(0x4000),
                "main.bar" => Some(0x5000),
                _ => None,
            }
        }
        fn name_at(&self, pc: Address) -> Option<String> {
            (pc == 0x4000).then(|| "main.foo".to_string())
        }
        fn names_matching(&self, pattern: &regex::Regex) -> Vec<String> {
            ["main.foo", "main.bar"]
                .into_iter()
                .filter(|n| pattern.is_match(n))
                .map(String::from)
                .collect()
        }
    }

    struct FakeDwarf;
    impl DwarfInfo for FakeDwarf {
        fn pc_to_sp_offset(&self, _pc: Address) -> Option<i64> {
            None
        }
        fn entry_for_pc(&self, _pc: Address) -> Option<(DieHandle, Address)> {
            None
        }
        fn formal_parameters(&self, _entry: DieHandle) -> Result<Vec<(String, i64)>, rdbg_trace::Error> {
            Ok(Vec::new())
        }
        fn pc_to_file_line(&self, pc: Address) -> Option<String> {
            (pc == 0x4000).then(|| "main.go:10".to_string())
        }
    }

    struct FakePrinter;
    impl ValuePrinter for FakePrinter {
        fn format_at(&self, addr: Address, _type_hint: Option<&str>) -> String {
            format!("<{addr:#x}>")
        }
    }

    #[test]
    fn re_prefix_returns_matching_symbols() {
        let result = eval("re:^main\\.", &FakeSymbols, &FakeDwarf, &FakePrinter).unwrap();
        assert_eq!(result, vec!["main.foo", "main.bar"]);
    }

    #[test]
    fn addr_prefix_formats_pc_as_hex() {
        let result = eval("addr:main.foo", &FakeSymbols, &FakeDwarf, &FakePrinter).unwrap();
        assert_eq!(result, vec!["0x4000"]);
    }

    #[test]
    fn src_prefix_looks_up_file_line() {
        let result = eval("src:0x4000", &FakeSymbols, &FakeDwarf, &FakePrinter).unwrap();
        assert_eq!(result, vec!["main.go:10"]);
    }

    #[test]
    fn leading_digit_looks_up_symbol_name() {
        let result = eval("16384", &FakeSymbols, &FakeDwarf, &FakePrinter).unwrap();
        assert_eq!(result, vec!["main.foo"]);
    }

    #[test]
    fn unknown_prefix_is_bad_syntax() {
        assert!(eval("???", &FakeSymbols, &FakeDwarf, &FakePrinter).is_err());
    }

    #[test]
    fn eval_address_falls_back_to_numeric_parse() {
        assert_eq!(eval_address("0x1000", &FakeSymbols).unwrap(), 0x1000);
        assert_eq!(eval_address("main.foo", &FakeSymbols).unwrap(), 0x4000);
        assert!(eval_address("not-a-thing", &FakeSymbols).is_err());
    }

    #[rstest::rstest]
    #[case("0x1000", Some(0x1000))]
    #[case("0X1000", Some(0x1000))]
    #[case("0o2000", Some(0x400))]
    #[case("0b1000", Some(0x8))]
    #[case("4096", Some(4096))]
    #[case("not-a-number", None)]
    fn parse_address_accepts_the_usual_radixes(#[case] input: &str, #[case] expected: Option<Address>) {
        assert_eq!(parse_address(input), expected);
    }

    #[test]
    fn breakpoint_regex_resolves_to_multiple_pcs() {
        let addrs = resolve_breakpoint_addresses("re:^main\\.", &FakeSymbols).unwrap();
        assert_eq!(addrs.len(), 2);
    }
}
