//! Stack walker (component C9).

use crate::anchors::RuntimeAnchors;
use crate::arch::Arch;
use crate::breakpoint::Address;
use crate::error::Error;
use crate::traits::{DwarfInfo, MemoryReader, SymbolResolver, ValuePrinter};

/// One textual frame record, per spec §4.8 step d:
/// `PC=<hex>, SP=<hex>: name (off(FP)) = value ...`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub text: String,
}

#[allow(clippy::too_many_arguments)]
pub fn handle_frames(
    arch: &dyn Arch,
    dwarf: &dyn DwarfInfo,
    symbols: &dyn SymbolResolver,
    printer: &dyn ValuePrinter,
    memory: &dyn MemoryReader,
    anchors: &RuntimeAnchors,
    mut pc: Address,
    mut sp: Address,
    count: usize,
) -> Result<Vec<Frame>, Error> {
    let ptr_size = arch.pointer_size() as u64;
    let mut frames = Vec::with_capacity(count);

    for _ in 0..count {
        let fp_offset = dwarf.pc_to_sp_offset(pc).unwrap_or(0);
        let fp = (sp as i64 + fp_offset) as u64;

        let (entry, func_entry) = dwarf
            .entry_for_pc(pc)
            .ok_or(Error::NoFrameEntry(pc))?;

        let params = dwarf.formal_parameters(entry)?;

        let name = symbols
            .name_at(func_entry)
            .unwrap_or_else(|| format!("{func_entry:#x}"));

        let mut text = format!("PC={pc:#x}, SP={sp:#x}: {name}");
        for (pname, offset) in &params {
            let addr = (fp as i64 + offset) as u64;
            let value = printer.format_at(addr, None);
            text.push_str(&format!(" ({offset}(FP)) {pname} = {value}"));
        }
        frames.push(Frame { text });

        if anchors.contains(func_entry) {
            break;
        }

        let ret_addr_loc = fp.wrapping_sub(ptr_size);
        let bytes = memory.read(ret_addr_loc, ptr_size as usize)?;
        let mut buf = [0u8; 8];
        buf[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
        let ret_addr = u64::from_ne_bytes(buf);

        pc = ret_addr;
        sp = fp;
    }

    Ok(frames)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arch::X86_64;
    use crate::traits::DieHandle;
    use std::cell::RefCell;

    struct FixedDwarf {
        sp_offset: i64,
        entry: DieHandle,
        func_entry: Address,
        params: Vec<(String, i64)>,
    }

    impl DwarfInfo for FixedDwarf {
        fn pc_to_sp_offset(&self, _pc: Address) -> Option<i64> {
            Some(self.sp_offset)
        }
        fn entry_for_pc(&self, _pc: Address) -> Option<(DieHandle, Address)> {
            Some((self.entry, self.func_entry))
        }
        fn formal_parameters(&self, _entry: DieHandle) -> Result<Vec<(String, i64)>, Error> {
            Ok(self.params.clone())
        }
        fn pc_to_file_line(&self, _pc: Address) -> Option<String> {
            None
        }
    }

    struct NamedSymbols;
    impl SymbolResolver for NamedSymbols {
        fn pc_of(&self, _name: &str) -> Option<Address> {
            None
        }
        fn name_at(&self, pc: Address) -> Option<String> {
            Some(format!("fn_{pc:#x}"))
        }
        fn names_matching(&self, _pattern: &regex::Regex) -> Vec<String> {
            Vec::new()
        }
    }

    struct EchoPrinter;
    impl ValuePrinter for EchoPrinter {
        fn format_at(&self, addr: Address, _type_hint: Option<&str>) -> String {
            format!("<{addr:#x}>")
        }
    }

    struct FakeMemory {
        return_addrs: RefCell<Vec<Address>>,
    }
    impl MemoryReader for FakeMemory {
        fn read(&self, _addr: Address, len: usize) -> Result<Vec<u8>, Error> {
            let mut addrs = self.return_addrs.borrow_mut();
            let ret = addrs.pop().unwrap_or(0);
            Ok(ret.to_ne_bytes()[..len].to_vec())
        }
        fn pointer_size(&self) -> u8 {
            8
        }
    }

    #[test]
    fn stops_at_runtime_anchor_without_reading_caller_frame() {
        let arch = X86_64;
        let dwarf = FixedDwarf {
            sp_offset: 16,
            entry: DieHandle(1),
            func_entry: 0x1000,
            params: vec![("x".into(), 8)],
        };
        let symbols = NamedSymbols;
        let printer = EchoPrinter;
        let memory = FakeMemory {
            return_addrs: RefCell::new(vec![]),
        };
        let anchors = RuntimeAnchors {
            goexit: 0x1000,
            ..Default::default()
        };

        let frames = handle_frames(
            &arch, &dwarf, &symbols, &printer, &memory, &anchors, 0x1000, 0x7000, 5,
        )
        .unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].text.contains("PC=0x1000"));
        assert!(frames[0].text.contains("x ="));
    }

    #[test]
    fn walks_multiple_frames_via_return_address() {
        let arch = X86_64;
        let dwarf = FixedDwarf {
            sp_offset: 0,
            entry: DieHandle(1),
            func_entry: 0x2000,
            params: vec![],
        };
        let symbols = NamedSymbols;
        let printer = EchoPrinter;
        // handle_frames pops one return address per frame after the first.
        let memory = FakeMemory {
            return_addrs: RefCell::new(vec![0x4000, 0x3000]),
        };
        let anchors = RuntimeAnchors::default();

        let frames = handle_frames(
            &arch, &dwarf, &symbols, &printer, &memory, &anchors, 0x2000, 0x7000, 2,
        )
        .unwrap();

        assert_eq!(frames.len(), 2);
    }
}
