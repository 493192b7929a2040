mod binding;
mod initialize_params;
