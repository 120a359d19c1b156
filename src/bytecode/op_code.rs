use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OpCode {
    Mov = 0,
    Add = 1,
    Sub = 2,
    Mul = 3,
    Div = 4,
    Mod = 5,
    Exp = 6,
    Neg = 7,
    Inc = 8,
    Dec = 9,
    And = 10,
    Or = 11,
    Xor = 12,
    Not = 13,
    Shl = 14,
    Shr = 15,
    Concat = 16,
    GetChar = 17,
    SetChar = 18,
    Jmp = 19,
    Je = 20,
    Jne = 21,
    Jg = 22,
    Jl = 23,
    Jge = 24,
    Jle = 25,
    Push = 26,
    Pop = 27,
    Call = 28,
    Ret = 29,
    CallHost = 30,
    Pause = 31,
    Exit = 32,
}

/// Every opcode in wire order; `ALL[op as usize] == op`.
pub const ALL: [OpCode; 33] = [
    OpCode::Mov,
    OpCode::Add,
    OpCode::Sub,
    OpCode::Mul,
    OpCode::Div,
    OpCode::Mod,
    OpCode::Exp,
    OpCode::Neg,
    OpCode::Inc,
    OpCode::Dec,
    OpCode::And,
    OpCode::Or,
    OpCode::Xor,
    OpCode::Not,
    OpCode::Shl,
    OpCode::Shr,
    OpCode::Concat,
    OpCode::GetChar,
    OpCode::SetChar,
    OpCode::Jmp,
    OpCode::Je,
    OpCode::Jne,
    OpCode::Jg,
    OpCode::Jl,
    OpCode::Jge,
    OpCode::Jle,
    OpCode::Push,
    OpCode::Pop,
    OpCode::Call,
    OpCode::Ret,
    OpCode::CallHost,
    OpCode::Pause,
    OpCode::Exit,
];

impl TryFrom<u16> for OpCode {
    type Error = u16;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        ALL.get(code as usize).copied().ok_or(code)
    }
}

impl OpCode {
    /// Number of operands the instruction carries in a well-formed image.
    pub fn operand_count(self) -> usize {
        match self {
            OpCode::Ret => 0,
            OpCode::Neg
            | OpCode::Inc
            | OpCode::Dec
            | OpCode::Not
            | OpCode::Jmp
            | OpCode::Push
            | OpCode::Pop
            | OpCode::Call
            | OpCode::CallHost
            | OpCode::Pause
            | OpCode::Exit => 1,
            OpCode::GetChar
            | OpCode::SetChar
            | OpCode::Je
            | OpCode::Jne
            | OpCode::Jg
            | OpCode::Jl
            | OpCode::Jge
            | OpCode::Jle => 3,
            _ => 2,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Mov => "MOV",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Exp => "EXP",
            OpCode::Neg => "NEG",
            OpCode::Inc => "INC",
            OpCode::Dec => "DEC",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::Xor => "XOR",
            OpCode::Not => "NOT",
            OpCode::Shl => "SHL",
            OpCode::Shr => "SHR",
            OpCode::Concat => "CONCAT",
            OpCode::GetChar => "GETCHAR",
            OpCode::SetChar => "SETCHAR",
            OpCode::Jmp => "JMP",
            OpCode::Je => "JE",
            OpCode::Jne => "JNE",
            OpCode::Jg => "JG",
            OpCode::Jl => "JL",
            OpCode::Jge => "JGE",
            OpCode::Jle => "JLE",
            OpCode::Push => "PUSH",
            OpCode::Pop => "POP",
            OpCode::Call => "CALL",
            OpCode::Ret => "RET",
            OpCode::CallHost => "CALLHOST",
            OpCode::Pause => "PAUSE",
            OpCode::Exit => "EXIT",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
