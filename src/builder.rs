use crate::ir::{
    BasicBlock, BinOp, CmpOp, ExternalFunction, Function, GlobalVar, Instr, IrType, Module, Value,
};

/// Instruction-building facade over an [`ir::Module`].
///
/// The lowering pass goes through this interface exclusively; it never
/// touches the module structure directly. Temporaries, block labels, and
/// string-constant labels are numbered module-wide so emitted text is
/// stable and unambiguous.
pub struct Builder {
    module: Module,
    current_function: Option<usize>,
    current_block: Option<usize>,
    temp_counter: usize,
    label_counter: usize,
    str_counter: usize,
}

impl Builder {
    pub fn new(module_name: impl Into<String>) -> Self {
        Builder {
            module: Module::new(module_name),
            current_function: None,
            current_block: None,
            temp_counter: 0,
            label_counter: 0,
            str_counter: 0,
        }
    }

    pub fn finish(self) -> Module {
        self.module
    }

    // -----------------------------------------------------------------
    // Functions and blocks
    // -----------------------------------------------------------------

    pub fn declare_external(
        &mut self,
        name: impl Into<String>,
        ret: IrType,
        params: Vec<IrType>,
        varargs: bool,
    ) {
        let name = name.into();
        if self.module.externals.iter().any(|e| e.name == name) {
            return;
        }
        self.module.externals.push(ExternalFunction {
            name,
            ret,
            params,
            varargs,
        });
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.module.function(name).is_some()
    }

    pub fn external(&self, name: &str) -> Option<&ExternalFunction> {
        self.module.externals.iter().find(|e| e.name == name)
    }

    pub fn function_signature(&self, name: &str) -> Option<(IrType, Vec<IrType>)> {
        if let Some(func) = self.module.function(name) {
            return Some((
                func.ret.clone(),
                func.params.iter().map(|(_, t)| t.clone()).collect(),
            ));
        }
        self.external(name)
            .map(|e| (e.ret.clone(), e.params.clone()))
    }

    /// Create a function and make it current. The entry block is not
    /// created here; bodies start with an explicit `create_block`.
    pub fn create_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<(String, IrType)>,
        ret: IrType,
    ) {
        self.module.functions.push(Function {
            name: name.into(),
            params,
            ret,
            blocks: Vec::new(),
        });
        self.current_function = Some(self.module.functions.len() - 1);
        self.current_block = None;
    }

    /// Drop a function again; used for the throwaway context that
    /// evaluates global initializers.
    pub fn discard_function(&mut self, name: &str) {
        self.module.functions.retain(|f| f.name != name);
        self.current_function = None;
        self.current_block = None;
    }

    /// Current (function, block) labels, for callers that need to emit a
    /// nested function and come back.
    pub fn insertion_position(&self) -> Option<(String, String)> {
        let f = self.current_function?;
        let b = self.current_block?;
        let func = &self.module.functions[f];
        Some((func.name.clone(), func.blocks[b].label.clone()))
    }

    pub fn restore_insertion_position(&mut self, function: &str, block: &str) {
        let idx = self
            .module
            .functions
            .iter()
            .position(|f| f.name == function)
            .expect("unknown function");
        self.current_function = Some(idx);
        self.set_insertion_block(block);
    }

    /// Append a fresh block (unique label derived from `hint`) to the
    /// current function and return its label. Does not move insertion.
    pub fn create_block(&mut self, hint: &str) -> String {
        let label = if hint == "entry" && self.current_function_blocks().is_empty() {
            "entry".to_string()
        } else {
            let label = format!("{hint}.{}", self.label_counter);
            self.label_counter += 1;
            label
        };
        let idx = self.current_function.expect("no current function");
        self.module.functions[idx].blocks.push(BasicBlock::new(label.clone()));
        label
    }

    pub fn set_insertion_block(&mut self, label: &str) {
        let idx = self.current_function.expect("no current function");
        let block = self.module.functions[idx]
            .blocks
            .iter()
            .position(|b| b.label == label)
            .expect("unknown block label");
        self.current_block = Some(block);
    }

    pub fn current_block_terminated(&self) -> bool {
        match (self.current_function, self.current_block) {
            (Some(f), Some(b)) => self.module.functions[f].blocks[b].is_terminated(),
            _ => true,
        }
    }

    fn current_function_blocks(&self) -> &[BasicBlock] {
        match self.current_function {
            Some(idx) => &self.module.functions[idx].blocks,
            None => &[],
        }
    }

    fn emit(&mut self, instr: Instr) {
        let f = self.current_function.expect("no current function");
        let b = self.current_block.expect("no insertion block");
        let block = &mut self.module.functions[f].blocks[b];
        // Nothing may follow a terminator; silently dropping dead code
        // keeps lowering of `return x; y;` well-formed.
        if !block.is_terminated() {
            block.instrs.push(instr);
        }
    }

    fn new_temp(&mut self) -> Value {
        let temp = Value::Temp(self.temp_counter);
        self.temp_counter += 1;
        temp
    }

    // -----------------------------------------------------------------
    // Instructions
    // -----------------------------------------------------------------

    pub fn create_alloca(&mut self, name: &str, ty: IrType) -> Value {
        let dest = self.new_temp();
        self.emit(Instr::Alloca {
            dest: dest.clone(),
            ty,
            name: name.to_string(),
        });
        dest
    }

    pub fn create_load(&mut self, ty: IrType, addr: Value) -> Value {
        let dest = self.new_temp();
        self.emit(Instr::Load {
            dest: dest.clone(),
            ty,
            addr,
        });
        dest
    }

    pub fn create_store(&mut self, ty: IrType, value: Value, addr: Value) {
        self.emit(Instr::Store { ty, value, addr });
    }

    pub fn create_binary(&mut self, op: BinOp, ty: IrType, lhs: Value, rhs: Value) -> Value {
        let dest = self.new_temp();
        self.emit(Instr::Binary {
            dest: dest.clone(),
            op,
            ty,
            lhs,
            rhs,
        });
        dest
    }

    pub fn create_cmp(&mut self, op: CmpOp, float: bool, ty: IrType, lhs: Value, rhs: Value) -> Value {
        let dest = self.new_temp();
        self.emit(Instr::Cmp {
            dest: dest.clone(),
            op,
            float,
            ty,
            lhs,
            rhs,
        });
        dest
    }

    pub fn create_neg(&mut self, ty: IrType, src: Value) -> Value {
        let dest = self.new_temp();
        self.emit(Instr::Neg {
            dest: dest.clone(),
            ty,
            src,
        });
        dest
    }

    pub fn create_not(&mut self, ty: IrType, src: Value) -> Value {
        let dest = self.new_temp();
        self.emit(Instr::Not {
            dest: dest.clone(),
            ty,
            src,
        });
        dest
    }

    /// Void calls produce no destination; everything else lands in a temp.
    pub fn create_call(
        &mut self,
        ret: IrType,
        callee: &str,
        args: Vec<(IrType, Value)>,
    ) -> Option<Value> {
        let dest = if ret.is_void() {
            None
        } else {
            Some(self.new_temp())
        };
        self.emit(Instr::Call {
            dest: dest.clone(),
            ret,
            callee: callee.to_string(),
            args,
        });
        dest
    }

    pub fn create_br(&mut self, target: &str) {
        self.emit(Instr::Br {
            target: target.to_string(),
        });
    }

    pub fn create_cond_br(&mut self, cond: Value, then_label: &str, else_label: &str) {
        self.emit(Instr::CondBr {
            cond,
            then_label: then_label.to_string(),
            else_label: else_label.to_string(),
        });
    }

    pub fn create_ret(&mut self, ty: IrType, value: Option<Value>) {
        self.emit(Instr::Ret { ty, value });
    }

    pub fn create_inline_asm(&mut self, code: &str) {
        self.emit(Instr::InlineAsm {
            code: code.to_string(),
        });
    }

    // -----------------------------------------------------------------
    // Constants and globals
    // -----------------------------------------------------------------

    pub fn const_int(&self, value: i64) -> Value {
        Value::Int(value)
    }

    pub fn const_float(&self, value: f64) -> Value {
        Value::Float(value)
    }

    pub fn const_bool(&self, value: bool) -> Value {
        Value::Bool(value)
    }

    pub fn const_null(&self) -> Value {
        Value::Null
    }

    /// Intern a string constant; identical contents share one label.
    pub fn create_global_string(&mut self, content: &str) -> Value {
        if let Some((label, _)) = self.module.strings.iter().find(|(_, c)| c == content) {
            return Value::Str(label.clone());
        }
        let label = format!(".str.{}", self.str_counter);
        self.str_counter += 1;
        self.module.strings.push((label.clone(), content.to_string()));
        Value::Str(label)
    }

    pub fn create_global(&mut self, name: &str, ty: IrType, init: Value, constant: bool) {
        self.module.globals.push(GlobalVar {
            name: name.to_string(),
            ty,
            init,
            constant,
        });
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.module.globals.iter().any(|g| g.name == name)
    }

    pub fn global_type(&self, name: &str) -> Option<IrType> {
        self.module
            .globals
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.ty.clone())
    }
}
