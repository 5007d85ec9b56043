//! Builds the vendored Lua 5.3 interpreter and links it statically.

fn main() {
    let artifacts = lua_src::Build::new().build(lua_src::Lua53);
    artifacts.print_cargo_metadata();
}
