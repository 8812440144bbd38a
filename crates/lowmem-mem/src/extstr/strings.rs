//! Built-in constant strings for the constant table store.
//!
//! [`BUILTIN_STRINGS`] lists the names the interpreter interns on its own
//! (global objects, internal `\xff`-prefixed property keys, keywords, method
//! names). [`APP_STRINGS`] holds names used by application bindings. Both
//! are fixed at build time; regenerate them from the interpreter metadata and
//! an application source scan when either changes.

use std::ffi::CStr;

/// Strings interned by the interpreter itself.
pub static BUILTIN_STRINGS: &[&CStr] = &[
    c"Logger",
    c"Thread",
    c"Pointer",
    c"Buffer",
    c"DecEnv",
    c"ObjEnv",
    c"",
    c"global",
    c"Arguments",
    c"JSON",
    c"Math",
    c"Error",
    c"RegExp",
    c"Date",
    c"Number",
    c"Boolean",
    c"String",
    c"Array",
    c"Function",
    c"Object",
    c"Null",
    c"Undefined",
    c"{_func:true}",
    c"{\x22_func\x22:true}",
    c"{\x22_ninf\x22:true}",
    c"{\x22_inf\x22:true}",
    c"{\x22_nan\x22:true}",
    c"{\x22_undef\x22:true}",
    c"toLogString",
    c"clog",
    c"l",
    c"n",
    c"fatal",
    c"error",
    c"warn",
    c"debug",
    c"trace",
    c"raw",
    c"fmt",
    c"current",
    c"resume",
    c"compact",
    c"jc",
    c"jx",
    c"base64",
    c"hex",
    c"dec",
    c"enc",
    c"fin",
    c"gc",
    c"act",
    c"info",
    c"version",
    c"env",
    c"modLoaded",
    c"modSearch",
    c"errThrow",
    c"errCreate",
    c"compile",
    c"\xffRegbase",
    c"\xffThread",
    c"\xffHandler",
    c"\xffFinalizer",
    c"\xffCallee",
    c"\xffMap",
    c"\xffArgs",
    c"\xffThis",
    c"\xffPc2line",
    c"\xffSource",
    c"\xffVarenv",
    c"\xffLexenv",
    c"\xffVarmap",
    c"\xffFormals",
    c"\xffBytecode",
    c"\xffNext",
    c"\xffTarget",
    c"\xffValue",
    c"pointer",
    c"buffer",
    c"\xffTracedata",
    c"lineNumber",
    c"fileName",
    c"pc",
    c"stack",
    c"ThrowTypeError",
    c"Duktape",
    c"id",
    c"require",
    c"__proto__",
    c"setPrototypeOf",
    c"ownKeys",
    c"enumerate",
    c"deleteProperty",
    c"has",
    c"Proxy",
    c"callee",
    c"Invalid Date",
    c"[...]",
    c"\x0a\x09",
    c" ",
    c",",
    c"-0",
    c"+0",
    c"0",
    c"-Infinity",
    c"+Infinity",
    c"Infinity",
    c"object",
    c"string",
    c"number",
    c"boolean",
    c"undefined",
    c"stringify",
    c"tan",
    c"sqrt",
    c"sin",
    c"round",
    c"random",
    c"pow",
    c"min",
    c"max",
    c"log",
    c"floor",
    c"exp",
    c"cos",
    c"ceil",
    c"atan2",
    c"atan",
    c"asin",
    c"acos",
    c"abs",
    c"SQRT2",
    c"SQRT1_2",
    c"PI",
    c"LOG10E",
    c"LOG2E",
    c"LN2",
    c"LN10",
    c"E",
    c"message",
    c"name",
    c"input",
    c"index",
    c"(?:)",
    c"lastIndex",
    c"multiline",
    c"ignoreCase",
    c"source",
    c"test",
    c"exec",
    c"toGMTString",
    c"setYear",
    c"getYear",
    c"toJSON",
    c"toISOString",
    c"toUTCString",
    c"setUTCFullYear",
    c"setFullYear",
    c"setUTCMonth",
    c"setMonth",
    c"setUTCDate",
    c"setDate",
    c"setUTCHours",
    c"setHours",
    c"setUTCMinutes",
    c"setMinutes",
    c"setUTCSeconds",
    c"setSeconds",
    c"setUTCMilliseconds",
    c"setMilliseconds",
    c"setTime",
    c"getTimezoneOffset",
    c"getUTCMilliseconds",
    c"getMilliseconds",
    c"getUTCSeconds",
    c"getSeconds",
    c"getUTCMinutes",
    c"getMinutes",
    c"getUTCHours",
    c"getHours",
    c"getUTCDay",
    c"getDay",
    c"getUTCDate",
    c"getDate",
    c"getUTCMonth",
    c"getMonth",
    c"getUTCFullYear",
    c"getFullYear",
    c"getTime",
    c"toLocaleTimeString",
    c"toLocaleDateString",
    c"toTimeString",
    c"toDateString",
    c"now",
    c"UTC",
    c"parse",
    c"toPrecision",
    c"toExponential",
    c"toFixed",
    c"POSITIVE_INFINITY",
    c"NEGATIVE_INFINITY",
    c"NaN",
    c"MIN_VALUE",
    c"MAX_VALUE",
    c"substr",
    c"trim",
    c"toLocaleUpperCase",
    c"toUpperCase",
    c"toLocaleLowerCase",
    c"toLowerCase",
    c"substring",
    c"split",
    c"search",
    c"replace",
    c"match",
    c"localeCompare",
    c"charCodeAt",
    c"charAt",
    c"fromCharCode",
    c"reduceRight",
    c"reduce",
    c"filter",
    c"map",
    c"forEach",
    c"some",
    c"every",
    c"lastIndexOf",
    c"indexOf",
    c"unshift",
    c"splice",
    c"sort",
    c"slice",
    c"shift",
    c"reverse",
    c"push",
    c"pop",
    c"join",
    c"concat",
    c"isArray",
    c"arguments",
    c"caller",
    c"bind",
    c"call",
    c"apply",
    c"propertyIsEnumerable",
    c"isPrototypeOf",
    c"hasOwnProperty",
    c"valueOf",
    c"toLocaleString",
    c"toString",
    c"constructor",
    c"set",
    c"get",
    c"enumerable",
    c"configurable",
    c"writable",
    c"value",
    c"keys",
    c"isExtensible",
    c"isFrozen",
    c"isSealed",
    c"preventExtensions",
    c"freeze",
    c"seal",
    c"defineProperties",
    c"defineProperty",
    c"create",
    c"getOwnPropertyNames",
    c"getOwnPropertyDescriptor",
    c"getPrototypeOf",
    c"prototype",
    c"length",
    c"alert",
    c"print",
    c"unescape",
    c"escape",
    c"encodeURIComponent",
    c"encodeURI",
    c"decodeURIComponent",
    c"decodeURI",
    c"isFinite",
    c"isNaN",
    c"parseFloat",
    c"parseInt",
    c"eval",
    c"URIError",
    c"TypeError",
    c"SyntaxError",
    c"ReferenceError",
    c"RangeError",
    c"EvalError",
    c"break",
    c"case",
    c"catch",
    c"continue",
    c"debugger",
    c"default",
    c"delete",
    c"do",
    c"else",
    c"finally",
    c"for",
    c"function",
    c"if",
    c"in",
    c"instanceof",
    c"new",
    c"return",
    c"switch",
    c"this",
    c"throw",
    c"try",
    c"typeof",
    c"var",
    c"void",
    c"while",
    c"with",
    c"class",
    c"const",
    c"enum",
    c"export",
    c"extends",
    c"import",
    c"super",
    c"null",
    c"true",
    c"false",
    c"implements",
    c"interface",
    c"let",
    c"package",
    c"private",
    c"protected",
    c"public",
    c"static",
    c"yield",
];

/// Strings used by application-specific bindings.
pub static APP_STRINGS: &[&CStr] = &[
    c"foo",
    c"bar",
    c"quux",
    c"enableFrob",
    c"disableFrob",
];
